//! Persisted set of job ids the user has hidden.

use std::collections::HashSet;

use super::KvStore;
use crate::db::DatabaseError;

/// Storage key of the hidden-job list.
pub const HIDDEN_JOBS_KEY: &str = "hidden_job_ids";

/// Local override store: job ids hidden by the user, independent of server
/// state. Persisted as an ordered JSON array so a reload cannot resurrect a
/// hidden job before the next merge re-applies the filter.
///
/// Nothing is cached in memory; every call re-reads the store.
#[derive(Clone)]
pub struct HiddenJobStore {
    store: KvStore,
}

impl HiddenJobStore {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// Current hidden set. Read failures are logged and treated as empty.
    pub fn load(&self) -> HashSet<String> {
        match self.store.get_json::<Vec<String>>(HIDDEN_JOBS_KEY) {
            Ok(ids) => ids.unwrap_or_default().into_iter().collect(),
            Err(e) => {
                log::warn!("Failed to read hidden job ids, assuming none: {}", e);
                HashSet::new()
            }
        }
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.load().contains(job_id)
    }

    /// Appends `job_id`. Returns false if it was already hidden.
    pub fn insert(&self, job_id: &str) -> Result<bool, DatabaseError> {
        self.store
            .update_json::<Vec<String>, _, _>(HIDDEN_JOBS_KEY, None, |ids| {
                if ids.iter().any(|id| id == job_id) {
                    (false, false)
                } else {
                    ids.push(job_id.to_string());
                    (true, true)
                }
            })
    }

    /// Removes `job_id`. Returns false if it was not hidden.
    pub fn remove(&self, job_id: &str) -> Result<bool, DatabaseError> {
        self.store
            .update_json::<Vec<String>, _, _>(HIDDEN_JOBS_KEY, None, |ids| {
                let before = ids.len();
                ids.retain(|id| id != job_id);
                let removed = ids.len() != before;
                (removed, removed)
            })
    }
}
