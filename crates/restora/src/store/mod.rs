//! Named, process-wide persisted values.

pub mod kv;
pub mod overrides;

pub use kv::KvStore;
pub use overrides::HiddenJobStore;
