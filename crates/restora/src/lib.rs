pub mod blob_cache;
pub mod broadcast;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod favorites;
pub mod history;
pub mod logging;
pub mod remote;
pub mod secrets;
pub mod session;
pub mod store;

pub use blob_cache::{BlobCache, CacheError, CacheRequest, CachedImage, DisplayUrl, FetchError};
pub use broadcast::{ChangeBus, FavoritesEvent, FavoritesEventKind, HistoryEvent, StorageEvent};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, load_config_from_str, ClientConfig};
pub use error::{ConfigError, RestoraError, Result};
pub use favorites::{resolve_favorites, FavoriteRecord, FavoritesIndex, ResolvedFavorite, ToggleOutcome};
pub use history::{
    FetchOutcome, Group, GroupStatus, HideOutcome, HistoryReconciler, HistoryStatus, Job, JobMapper,
    JobStatus, ReconcilerSettings,
};
pub use remote::{HistoryPage, HttpHistoryClient, RawGroup, RawJob, RemoteError, RemoteHistory};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use session::Session;
pub use store::{HiddenJobStore, KvStore};
