//! Domain model for jobs and groups ("projects").

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Initiating,
    Processing,
    Completed,
    Failed,
    Canceled,
}

impl JobStatus {
    /// True for states a job can still leave.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            JobStatus::Pending | JobStatus::Initiating | JobStatus::Processing
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Image,
    Video,
}

/// One produced media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub group_id: String,
    pub status: JobStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub content_type: ContentType,
    pub nsfw: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    /// Local-only; the server never sends it.
    #[serde(default)]
    pub hidden: bool,
}

/// Exclusive lower bound of a window of `retention` ending at `now`.
/// Saturates at the earliest representable time.
pub fn window_start(now: DateTime<Utc>, retention: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(retention)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl Job {
    /// Timestamp the retention window is measured against: the end time, or
    /// the creation time while the job is still running.
    pub fn retention_anchor(&self) -> Option<DateTime<Utc>> {
        self.ended_at.or(self.created_at)
    }

    /// Whether the job is still inside a window of `retention` ending at `now`.
    pub fn in_window(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        let start = window_start(now, retention);
        self.retention_anchor()
            .map(|anchor| anchor > start)
            .unwrap_or(false)
    }

    /// Completed, safe and not hidden.
    pub fn is_displayable(&self) -> bool {
        !self.hidden && !self.nsfw && self.status == JobStatus::Completed
    }
}

/// Derived status of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Processing,
    Completed,
    Canceled,
    Failed,
}

/// Aggregate status of `jobs`, ignoring hidden members.
///
/// Any active member wins, then completed, then canceled, then failed. A
/// group with nothing left to count is still processing.
pub fn aggregate_status<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> GroupStatus {
    let (mut completed, mut canceled, mut failed) = (false, false, false);
    for job in jobs.into_iter().filter(|j| !j.hidden) {
        match job.status {
            s if s.is_active() => return GroupStatus::Processing,
            JobStatus::Completed => completed = true,
            JobStatus::Canceled => canceled = true,
            JobStatus::Failed => failed = true,
            _ => {}
        }
    }
    if completed {
        GroupStatus::Completed
    } else if canceled {
        GroupStatus::Canceled
    } else if failed {
        GroupStatus::Failed
    } else {
        GroupStatus::Processing
    }
}

/// Local state layered over what the server reported for a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Overlay {
    /// Exactly what the server says.
    #[default]
    Remote,
    Local {
        hidden: bool,
        scheduled_delete: bool,
    },
}

impl Overlay {
    pub fn hidden(self) -> bool {
        matches!(self, Overlay::Local { hidden: true, .. })
    }

    pub fn scheduled_delete(self) -> bool {
        matches!(
            self,
            Overlay::Local {
                scheduled_delete: true,
                ..
            }
        )
    }

    pub fn with_hidden(self, hidden: bool) -> Self {
        Self::local(hidden, self.scheduled_delete())
    }

    pub fn with_scheduled_delete(self, scheduled_delete: bool) -> Self {
        Self::local(self.hidden(), scheduled_delete)
    }

    fn local(hidden: bool, scheduled_delete: bool) -> Self {
        if hidden || scheduled_delete {
            Overlay::Local {
                hidden,
                scheduled_delete,
            }
        } else {
            Overlay::Remote
        }
    }
}

/// A set of jobs submitted together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub content_type: ContentType,
    /// Number of jobs the group was submitted with.
    pub expected_count: u32,
    pub jobs: Vec<Job>,
    pub status: GroupStatus,
    /// Set once, never moved afterwards.
    pub created_at: Option<DateTime<Utc>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub model_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default)]
    pub overlay: Overlay,
}

impl Group {
    pub fn is_hidden(&self) -> bool {
        self.overlay.hidden()
    }

    pub fn is_scheduled_delete(&self) -> bool {
        self.overlay.scheduled_delete()
    }

    pub fn job(&self, job_id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == job_id)
    }

    /// Replaces the member with the same id, or appends.
    pub fn upsert_job(&mut self, job: Job) {
        match self.jobs.iter_mut().find(|j| j.id == job.id) {
            Some(existing) => *existing = job,
            None => self.jobs.push(job),
        }
    }

    /// Re-derives the hidden overlay: hidden iff there are members and every
    /// one of them is hidden. An empty group keeps its current flag.
    pub fn recompute_hidden(&mut self) {
        if self.jobs.is_empty() {
            return;
        }
        let all_hidden = self.jobs.iter().all(|j| j.hidden);
        self.overlay = self.overlay.with_hidden(all_hidden);
    }

    pub fn recompute_status(&mut self) {
        self.status = aggregate_status(&self.jobs);
    }

    /// Earliest timestamp any member reports, used when no creation time was
    /// set from the first job seen.
    pub fn earliest_member_time(&self) -> Option<DateTime<Utc>> {
        self.jobs
            .iter()
            .filter_map(|j| j.created_at.or(j.ended_at))
            .min()
    }

    /// Whether any member is inside the retention window.
    pub fn has_member_in_window(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        self.jobs.iter().any(|j| j.in_window(now, retention))
    }
}
