//! Remote API error types.

use thiserror::Error;

/// Errors from calls to the restoration history API.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The request never produced a response (DNS, connect, timeout, TLS).
    #[error("Request failed: {0}")]
    Transport(String),

    /// The resource does not exist (already deleted, or never existed).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("Request failed ({status}): {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Invalid client configuration (bad base URL, missing key).
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;
