//! History reconciliation: paged remote jobs folded into a windowed list of
//! projects with local overrides.

pub mod mapping;
pub mod merge;
pub mod model;
pub mod reconciler;

pub use mapping::{normalize_epoch, JobMapper};
pub use merge::{merge_page, MergeContext, MergeResult};
pub use model::{
    aggregate_status, window_start, ContentType, Group, GroupStatus, Job, JobStatus, Overlay,
};
pub use reconciler::{
    FetchOutcome, HideOutcome, HistoryReconciler, HistoryStatus, ReconcilerSettings,
    DEFAULT_PAGE_SIZE, DEFAULT_RETENTION_HOURS, MAX_RETENTION_HOURS,
};
