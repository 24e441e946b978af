use std::path::PathBuf;
use thiserror::Error;

use crate::blob_cache::{CacheError, FetchError};
use crate::db::DatabaseError;
use crate::remote::RemoteError;
use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum RestoraError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    /// Neither the server nor the override store recorded a hide.
    #[error("Failed to hide job '{job_id}': remote: {remote}; local: {local}")]
    HideFailed {
        job_id: String,
        remote: RemoteError,
        #[source]
        local: DatabaseError,
    },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid URL for '{field}': {reason}")]
    InvalidUrl { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, RestoraError>;
