//! Remote history source consumed by the reconciler.
//!
//! The wire types here are what the API sends, before any mapping into the
//! domain model (`history::model`). Timestamps arrive in seconds or
//! milliseconds and are normalized during mapping.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod error;
pub mod http;

pub use error::RemoteError;
pub use http::HttpHistoryClient;

/// Group metadata attached to every raw job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGroup {
    pub id: String,
    /// Model that produced the group; used for the allow-list filter.
    #[serde(default)]
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// "image" or "video".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Number of jobs the group was submitted with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// A job record as returned by the history endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawJob {
    pub id: String,
    pub group: RawGroup,
    pub status: String,
    /// Seconds or milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<i64>,
    /// Seconds or milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub nsfw_triggered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    /// Signed media URL, present once the job produced output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
}

/// One page of history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    #[serde(default)]
    pub jobs: Vec<RawJob>,
    /// Offset of the next page, if the server reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<u64>,
}

/// Paged history query plus the two delete endpoints.
///
/// All calls are best-effort from the reconciler's point of view; it decides
/// how a failure degrades.
#[async_trait]
pub trait RemoteHistory: Send + Sync {
    /// Fetches up to `limit` jobs starting at `cursor`.
    async fn fetch_page(&self, cursor: u64, limit: u32) -> error::Result<HistoryPage>;

    /// Deletes a single job from its group.
    async fn delete_job(&self, group_id: &str, job_id: &str) -> error::Result<()>;

    /// Deletes a whole group.
    async fn delete_group(&self, group_id: &str) -> error::Result<()>;
}
