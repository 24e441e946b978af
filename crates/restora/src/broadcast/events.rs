//! Event payloads carried on the change buses.

use serde::Serialize;

/// A persisted key changed. Mirrors a storage-change notification: it tells
/// other instances sharing the store to re-read `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEvent {
    pub key: String,
    /// Instance that performed the write, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

/// What happened to a favorite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FavoritesEventKind {
    Added,
    Removed,
    Rekeyed { from: String },
    Cached,
}

/// In-context favorites notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesEvent {
    pub job_id: String,
    #[serde(flatten)]
    pub kind: FavoritesEventKind,
    pub origin: String,
}

/// History view changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum HistoryEvent {
    /// A page was merged into the committed state.
    Committed { cursor: u64, has_more: bool },
    /// A job was hidden locally or remotely.
    JobHidden { group_id: String, job_id: String },
    /// A group was scheduled for deletion.
    ProjectDeleted { group_id: String },
    /// A fetch failed; committed state is unchanged.
    FetchFailed { message: String },
}
