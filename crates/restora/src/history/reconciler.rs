//! History reconciler: paging, commit ordering and local mutations.

use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Duration;
use serde::Serialize;
use tokio::sync::broadcast;

use super::mapping::JobMapper;
use super::merge::{merge_page, MergeContext};
use super::model::{Group, Job};
use crate::broadcast::{ChangeBus, HistoryEvent};
use crate::clock::Clock;
use crate::error::RestoraError;
use crate::remote::{RemoteError, RemoteHistory};
use crate::store::HiddenJobStore;

/// Default number of jobs per page. Large enough that jobs of one group are
/// rarely split across pages.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Default retention window in hours.
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

/// Longest retention window a configuration may ask for (a century).
pub const MAX_RETENTION_HOURS: i64 = 24 * 365 * 100;

#[derive(Debug, Clone, Copy)]
pub struct ReconcilerSettings {
    pub page_size: u32,
    pub retention: Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            retention: Duration::hours(DEFAULT_RETENTION_HOURS),
        }
    }
}

/// What happened to a fetch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The page was merged into the committed state.
    Committed,
    /// Not issued: a conflicting fetch was in flight, or there is nothing
    /// more to load.
    Skipped,
    /// Issued, but superseded by the time it returned.
    Discarded,
    /// The remote call failed.
    Failed,
}

/// How a hide was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HideOutcome {
    /// Deleted on the server.
    Remote,
    /// The server no longer had the job.
    AlreadyGone,
    /// The remote delete failed; the hide only exists locally.
    LocalOnly,
}

/// Observable flags of the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStatus {
    pub loading: bool,
    pub has_more: bool,
    pub cursor: u64,
    pub initialized: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Refresh,
    LoadMore,
    Prefetch,
}

/// Identifies the state a fetch was issued against.
#[derive(Debug, Clone, Copy)]
struct Ticket {
    kind: FetchKind,
    epoch: u64,
    cursor: u64,
}

#[derive(Debug)]
struct State {
    groups: Vec<Group>,
    refreshes_in_flight: usize,
    loading_more: bool,
    prefetching: bool,
    /// Cursors with an outstanding load-more or prefetch request.
    in_flight_cursors: HashSet<u64>,
    has_more: bool,
    cursor: u64,
    initialized: bool,
    error: Option<String>,
    /// Bumped by every refresh; responses from older epochs are dropped.
    epoch: u64,
    scheduled_deletes: HashSet<String>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            refreshes_in_flight: 0,
            loading_more: false,
            prefetching: false,
            in_flight_cursors: HashSet::new(),
            has_more: true,
            cursor: 0,
            initialized: false,
            error: None,
            epoch: 0,
            scheduled_deletes: HashSet::new(),
        }
    }
}

impl State {
    fn loading(&self) -> bool {
        self.refreshes_in_flight > 0 || self.loading_more
    }

    fn finish(&mut self, ticket: &Ticket) {
        match ticket.kind {
            FetchKind::Refresh => {
                self.refreshes_in_flight = self.refreshes_in_flight.saturating_sub(1)
            }
            FetchKind::LoadMore => {
                self.loading_more = false;
                self.in_flight_cursors.remove(&ticket.cursor);
            }
            FetchKind::Prefetch => {
                self.prefetching = false;
                self.in_flight_cursors.remove(&ticket.cursor);
            }
        }
    }

    fn group_mut(&mut self, group_id: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.id == group_id)
    }
}

/// Maintains the windowed, locally-overridden view of remote job groups.
///
/// Committed groups are only replaced by a successful merge; failures never
/// blank them. Local hides and deletes are layered on as overlays and
/// resolved in [`HistoryReconciler::visible_projects`].
pub struct HistoryReconciler {
    remote: Arc<dyn RemoteHistory>,
    overrides: HiddenJobStore,
    mapper: JobMapper,
    clock: Arc<dyn Clock>,
    settings: ReconcilerSettings,
    state: RwLock<State>,
    events: ChangeBus<HistoryEvent>,
}

impl HistoryReconciler {
    pub fn new(
        remote: Arc<dyn RemoteHistory>,
        overrides: HiddenJobStore,
        mapper: JobMapper,
        clock: Arc<dyn Clock>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            remote,
            overrides,
            mapper,
            clock,
            settings,
            state: RwLock::new(State::default()),
            events: ChangeBus::default(),
        }
    }

    /// Subscribes to commit and mutation notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    /// Restarts from the first page. The committed list stays in place until
    /// the response is merged.
    pub async fn refresh(&self) -> FetchOutcome {
        let ticket = {
            let mut state = self.write_state();
            state.epoch += 1;
            state.cursor = 0;
            state.has_more = true;
            state.refreshes_in_flight += 1;
            Ticket {
                kind: FetchKind::Refresh,
                epoch: state.epoch,
                cursor: 0,
            }
        };
        log::debug!("Refreshing history (epoch {})", ticket.epoch);
        self.run(ticket).await
    }

    /// Fetches the next page, unless a fetch is already running, nothing has
    /// loaded yet, or there is nothing more.
    pub async fn load_more(&self) -> FetchOutcome {
        let ticket = {
            let mut state = self.write_state();
            if state.loading()
                || !state.initialized
                || !state.has_more
                || state.in_flight_cursors.contains(&state.cursor)
            {
                return FetchOutcome::Skipped;
            }
            state.loading_more = true;
            let cursor = state.cursor;
            state.in_flight_cursors.insert(cursor);
            Ticket {
                kind: FetchKind::LoadMore,
                epoch: state.epoch,
                cursor,
            }
        };
        self.run(ticket).await
    }

    /// Warms the next page without touching the loading flag. Dropped while
    /// another prefetch or a refresh is running.
    pub async fn prefetch_next(&self) -> FetchOutcome {
        let ticket = {
            let mut state = self.write_state();
            if state.prefetching
                || state.refreshes_in_flight > 0
                || !state.initialized
                || !state.has_more
                || state.in_flight_cursors.contains(&state.cursor)
            {
                return FetchOutcome::Skipped;
            }
            state.prefetching = true;
            let cursor = state.cursor;
            state.in_flight_cursors.insert(cursor);
            Ticket {
                kind: FetchKind::Prefetch,
                epoch: state.epoch,
                cursor,
            }
        };
        self.run(ticket).await
    }

    async fn run(&self, ticket: Ticket) -> FetchOutcome {
        let result = self
            .remote
            .fetch_page(ticket.cursor, self.settings.page_size)
            .await;

        // Re-read the override store on every pass; another instance may
        // have hidden jobs since the last one.
        let hidden = self.overrides.load();
        let now = self.clock.now();

        let (outcome, event) = {
            let mut guard = self.write_state();
            let state = &mut *guard;
            state.finish(&ticket);

            match result {
                Err(e) => Self::record_failure(state, &ticket, e),
                Ok(_) if ticket.epoch != state.epoch => {
                    log::debug!(
                        "Discarding page at cursor {} from stale epoch {}",
                        ticket.cursor,
                        ticket.epoch
                    );
                    (FetchOutcome::Discarded, None)
                }
                Ok(_) if ticket.kind != FetchKind::Refresh && ticket.cursor != state.cursor => {
                    log::debug!(
                        "Discarding page at cursor {}; committed cursor is {}",
                        ticket.cursor,
                        state.cursor
                    );
                    (FetchOutcome::Discarded, None)
                }
                Ok(page) => {
                    let ctx = MergeContext {
                        now,
                        retention: self.settings.retention,
                        mapper: &self.mapper,
                        hidden: &hidden,
                        scheduled_deletes: &state.scheduled_deletes,
                    };
                    let merged = merge_page(&ctx, &state.groups, ticket.cursor, &page);
                    state.groups = merged.groups;
                    state.cursor = merged.next_cursor;
                    state.has_more = merged.has_more;
                    state.initialized = true;
                    state.error = None;
                    log::info!(
                        "Committed history page at cursor {} ({} groups, has_more={})",
                        ticket.cursor,
                        state.groups.len(),
                        state.has_more
                    );
                    (
                        FetchOutcome::Committed,
                        Some(HistoryEvent::Committed {
                            cursor: state.cursor,
                            has_more: state.has_more,
                        }),
                    )
                }
            }
        };

        if let Some(event) = event {
            self.events.send(event);
        }
        outcome
    }

    fn record_failure(
        state: &mut State,
        ticket: &Ticket,
        error: RemoteError,
    ) -> (FetchOutcome, Option<HistoryEvent>) {
        if ticket.kind == FetchKind::Prefetch {
            log::debug!("Prefetch at cursor {} failed: {}", ticket.cursor, error);
            return (FetchOutcome::Failed, None);
        }
        if ticket.epoch != state.epoch {
            log::debug!("Ignoring failure from stale epoch {}: {}", ticket.epoch, error);
            return (FetchOutcome::Discarded, None);
        }
        log::warn!("History fetch at cursor {} failed: {}", ticket.cursor, error);
        let message = error.to_string();
        state.error = Some(message.clone());
        (
            FetchOutcome::Failed,
            Some(HistoryEvent::FetchFailed { message }),
        )
    }

    /// Hides a job: remote delete first, local-only hide on any failure.
    ///
    /// Either way the id is recorded in the override store and the job is
    /// flagged hidden in memory. Fails only when the remote delete failed
    /// and the override store could not be written either; nothing changes
    /// in that case.
    pub async fn hide_job(&self, group_id: &str, job_id: &str) -> Result<HideOutcome, RestoraError> {
        let (outcome, remote_error) = match self.remote.delete_job(group_id, job_id).await {
            Ok(()) => (HideOutcome::Remote, None),
            Err(e) if e.is_not_found() => {
                log::info!("Job {} already gone on the server", job_id);
                (HideOutcome::AlreadyGone, None)
            }
            Err(e) => {
                log::warn!("Remote delete of job {} failed, hiding locally: {}", job_id, e);
                (HideOutcome::LocalOnly, Some(e))
            }
        };

        if let Err(local) = self.overrides.insert(job_id) {
            match remote_error {
                Some(remote) => {
                    return Err(RestoraError::HideFailed {
                        job_id: job_id.to_string(),
                        remote,
                        local,
                    })
                }
                None => log::warn!("Failed to persist hidden job {}: {}", job_id, local),
            }
        }

        {
            let mut state = self.write_state();
            if let Some(group) = state.group_mut(group_id) {
                if let Some(job) = group.jobs.iter_mut().find(|j| j.id == job_id) {
                    job.hidden = true;
                }
                group.recompute_hidden();
                group.recompute_status();
            }
        }

        self.events.send(HistoryEvent::JobHidden {
            group_id: group_id.to_string(),
            job_id: job_id.to_string(),
        });
        Ok(outcome)
    }

    /// Deletes a whole group on the server. On success the group drops out
    /// of the visible list right away; on failure nothing changes.
    pub async fn delete_project(&self, group_id: &str) -> bool {
        match self.remote.delete_group(group_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                log::info!("Group {} already gone on the server", group_id);
            }
            Err(e) => {
                log::warn!("Failed to delete group {}: {}", group_id, e);
                return false;
            }
        }

        {
            let mut state = self.write_state();
            state.scheduled_deletes.insert(group_id.to_string());
            if let Some(group) = state.group_mut(group_id) {
                group.overlay = group.overlay.with_scheduled_delete(true);
            }
        }

        self.events.send(HistoryEvent::ProjectDeleted {
            group_id: group_id.to_string(),
        });
        true
    }

    /// Groups to display, derived on every call.
    ///
    /// A group shows when it is neither hidden nor scheduled for deletion and
    /// has at least one displayable member. Members are limited to visible,
    /// in-window jobs.
    pub fn visible_projects(&self) -> Vec<Group> {
        let hidden = self.overrides.load();
        let now = self.clock.now();
        let retention = self.settings.retention;
        let state = self.read_state();

        state
            .groups
            .iter()
            .filter(|g| {
                !g.is_hidden()
                    && !g.is_scheduled_delete()
                    && !state.scheduled_deletes.contains(&g.id)
            })
            .filter_map(|g| {
                let jobs: Vec<Job> = g
                    .jobs
                    .iter()
                    .filter(|j| !j.hidden && !hidden.contains(&j.id) && j.in_window(now, retention))
                    .cloned()
                    .collect();
                if !jobs.iter().any(Job::is_displayable) {
                    return None;
                }
                let mut view = g.clone();
                view.jobs = jobs;
                view.recompute_status();
                Some(view)
            })
            .collect()
    }

    /// Committed groups with their overlays, unfiltered.
    pub fn snapshot(&self) -> Vec<Group> {
        self.read_state().groups.clone()
    }

    pub fn group(&self, group_id: &str) -> Option<Group> {
        self.read_state()
            .groups
            .iter()
            .find(|g| g.id == group_id)
            .cloned()
    }

    pub fn status(&self) -> HistoryStatus {
        let state = self.read_state();
        HistoryStatus {
            loading: state.loading(),
            has_more: state.has_more,
            cursor: state.cursor,
            initialized: state.initialized,
            error: state.error.clone(),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("History state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("History state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
