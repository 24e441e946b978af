pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::{ApiConfig, CacheConfig, ClientConfig, HistoryConfig, LogFormat, LoggingConfig};
