//! Raw API records to domain model.
//!
//! Every decision is table-driven so the mapping can be tested on its own.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::model::{ContentType, Group, GroupStatus, Job, JobStatus, Overlay};
use crate::remote::RawJob;

/// Millisecond epoch of 2000-01-01T00:00:00Z. Smaller values are seconds.
pub const MILLIS_THRESHOLD: i64 = 946_684_800_000;

const STATUS_TABLE: &[(&str, JobStatus)] = &[
    ("pending", JobStatus::Pending),
    ("initiating", JobStatus::Initiating),
    ("processing", JobStatus::Processing),
    ("completed", JobStatus::Completed),
    ("failed", JobStatus::Failed),
    ("canceled", JobStatus::Canceled),
    ("cancelled", JobStatus::Canceled),
];

const CONTENT_TYPE_TABLE: &[(&str, ContentType)] = &[
    ("image", ContentType::Image),
    ("video", ContentType::Video),
];

/// Maps a status string. Unknown values are treated as still processing.
pub fn map_status(raw: &str) -> JobStatus {
    let needle = raw.trim().to_ascii_lowercase();
    match STATUS_TABLE.iter().find(|(name, _)| *name == needle) {
        Some((_, status)) => *status,
        None => {
            log::warn!("Unknown job status '{}', treating as processing", raw);
            JobStatus::Processing
        }
    }
}

pub fn map_content_type(raw: Option<&str>) -> ContentType {
    raw.map(|s| s.trim().to_ascii_lowercase())
        .and_then(|needle| {
            CONTENT_TYPE_TABLE
                .iter()
                .find(|(name, _)| *name == needle)
                .map(|(_, ct)| *ct)
        })
        .unwrap_or_default()
}

/// Converts a seconds-or-milliseconds epoch value. Zero and negative values
/// mean "not set".
pub fn normalize_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value <= 0 {
        return None;
    }
    let millis = if value < MILLIS_THRESHOLD {
        value.checked_mul(1000)?
    } else {
        value
    };
    DateTime::from_timestamp_millis(millis)
}

/// Filters and converts raw jobs.
#[derive(Debug, Clone, Default)]
pub struct JobMapper {
    allowed_models: HashSet<String>,
}

impl JobMapper {
    /// An empty allow-list accepts every model.
    pub fn new<I, S>(allowed_models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_models: allowed_models.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows_model(&self, model_id: &str) -> bool {
        self.allowed_models.is_empty() || self.allowed_models.contains(model_id)
    }

    /// Converts `raw`, or `None` when the job is ignored: foreign model, or
    /// no usable timestamp at all.
    pub fn map_job(&self, raw: &RawJob) -> Option<Job> {
        if !self.allows_model(&raw.group.model_id) {
            return None;
        }
        let job = Self::convert(raw);
        if job.retention_anchor().is_none() {
            log::debug!("Dropping job {} without timestamps", raw.id);
            return None;
        }
        Some(job)
    }

    /// Retention anchor of a raw job regardless of model, used to detect
    /// that a page reached past the window.
    pub fn anchor(raw: &RawJob) -> Option<DateTime<Utc>> {
        raw.end_time
            .and_then(normalize_epoch)
            .or_else(|| raw.create_time.and_then(normalize_epoch))
    }

    fn convert(raw: &RawJob) -> Job {
        Job {
            id: raw.id.clone(),
            group_id: raw.group.id.clone(),
            status: map_status(&raw.status),
            created_at: raw.create_time.and_then(normalize_epoch),
            ended_at: raw.end_time.and_then(normalize_epoch),
            content_type: map_content_type(raw.group.content_type.as_deref()),
            nsfw: raw.nsfw_triggered,
            cancel_reason: raw.cancel_reason.clone().filter(|r| !r.is_empty()),
            media_url: raw.output_url.clone().filter(|u| !u.is_empty()),
            hidden: false,
        }
    }

    /// Builds an empty group from the metadata carried on `raw`.
    pub fn new_group(raw: &RawJob) -> Group {
        Group {
            id: raw.group.id.clone(),
            content_type: map_content_type(raw.group.content_type.as_deref()),
            expected_count: raw.group.count.unwrap_or(1),
            jobs: Vec::new(),
            status: GroupStatus::Processing,
            created_at: None,
            width: raw.group.width,
            height: raw.group.height,
            model_id: raw.group.model_id.clone(),
            model_name: raw.group.model_name.clone(),
            overlay: Overlay::Remote,
        }
    }
}
