//! Favorites index with background cache population.

use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::join_all;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::record::FavoriteRecord;
use super::url::normalize_url;
use crate::blob_cache::{BlobCache, CacheRequest};
use crate::broadcast::{ChangeBus, FavoritesEvent, FavoritesEventKind};
use crate::db::DatabaseError;
use crate::store::KvStore;

/// Storage key of the favorites list.
pub const FAVORITES_KEY: &str = "favorites";

/// Result of [`FavoritesIndex::toggle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// An existing favorite for the same media was moved to the new job id.
    Rekeyed { from: String },
}

enum ToggleChange {
    Added(FavoriteRecord),
    Removed(FavoriteRecord),
    Rekeyed {
        from: FavoriteRecord,
        to: FavoriteRecord,
    },
}

/// State shared with background cache tasks.
struct Shared {
    store: KvStore,
    cache: Arc<BlobCache>,
    events: ChangeBus<FavoritesEvent>,
    instance_id: String,
}

impl Shared {
    fn read(&self) -> Vec<FavoriteRecord> {
        match self.store.get_json::<Vec<FavoriteRecord>>(FAVORITES_KEY) {
            Ok(list) => list.unwrap_or_default(),
            Err(e) => {
                log::warn!("Failed to read favorites, assuming none: {}", e);
                Vec::new()
            }
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut Vec<FavoriteRecord>) -> (bool, R)) -> Result<R, DatabaseError> {
        self.store
            .update_json::<Vec<FavoriteRecord>, _, _>(FAVORITES_KEY, Some(&self.instance_id), f)
    }

    fn emit(&self, job_id: &str, kind: FavoritesEventKind) {
        self.events.send(FavoritesEvent {
            job_id: job_id.to_string(),
            kind,
            origin: self.instance_id.clone(),
        });
    }

    /// Flags `job_id` as cached. Returns false if the favorite no longer
    /// exists.
    fn mark_cached(&self, job_id: &str) -> Result<bool, DatabaseError> {
        self.update(|list| match list.iter_mut().find(|f| f.job_id == job_id) {
            Some(record) if record.is_cached => (false, true),
            Some(record) => {
                record.is_cached = true;
                (true, true)
            }
            None => (false, false),
        })
    }

    fn remove_blob(&self, job_id: &str) {
        if let Err(e) = self.cache.delete(job_id) {
            log::warn!("Failed to remove cached image for {}: {}", job_id, e);
        }
    }

    /// Downloads the image for `record`. A favorite removed while the
    /// download ran has its freshly written blob deleted again.
    async fn populate(&self, record: FavoriteRecord) {
        let request = CacheRequest {
            job_id: record.job_id.clone(),
            group_id: record.group_id.clone(),
            source_url: record.url.clone(),
            created_at: record.created_at,
            label: record.label.clone(),
        };
        if let Err(e) = self.cache.put(&request).await {
            log::warn!("Failed to cache favorite {}: {}", record.job_id, e);
            return;
        }

        match self.mark_cached(&record.job_id) {
            Ok(true) => self.emit(&record.job_id, FavoritesEventKind::Cached),
            Ok(false) => {
                log::debug!("Favorite {} removed while caching, dropping blob", record.job_id);
                self.remove_blob(&record.job_id);
            }
            Err(e) => log::warn!("Failed to flag favorite {} as cached: {}", record.job_id, e),
        }
    }
}

/// Ordered favorite records, persisted apart from their image bytes.
///
/// Every call re-reads the store, so instances sharing a store converge
/// without holding copies. Mutations publish a [`FavoritesEvent`] to every
/// instance attached to the same bus; the store write itself publishes a
/// storage event for everything else.
pub struct FavoritesIndex {
    shared: Arc<Shared>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl FavoritesIndex {
    pub fn new(store: KvStore, cache: Arc<BlobCache>) -> Self {
        Self::with_bus(store, cache, ChangeBus::default())
    }

    pub fn with_bus(store: KvStore, cache: Arc<BlobCache>, events: ChangeBus<FavoritesEvent>) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                cache,
                events,
                instance_id: Uuid::new_v4().to_string(),
            }),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Another live instance over the same store, cache and bus.
    pub fn attach(&self) -> Self {
        Self::with_bus(
            self.shared.store.clone(),
            Arc::clone(&self.shared.cache),
            self.shared.events.clone(),
        )
    }

    pub fn instance_id(&self) -> &str {
        &self.shared.instance_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FavoritesEvent> {
        self.shared.events.subscribe()
    }

    pub fn cache(&self) -> &Arc<BlobCache> {
        &self.shared.cache
    }

    /// Favorites, newest first.
    pub fn list(&self) -> Vec<FavoriteRecord> {
        let mut list = self.shared.read();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub fn get(&self, job_id: &str) -> Option<FavoriteRecord> {
        self.shared.read().into_iter().find(|f| f.job_id == job_id)
    }

    pub fn is_favorite(&self, job_id: &str) -> bool {
        self.shared.read().iter().any(|f| f.job_id == job_id)
    }

    /// Inserts `record` unless its job id is already a favorite, then caches
    /// the image in the background.
    pub fn add(&self, record: FavoriteRecord) -> Result<bool, DatabaseError> {
        let record = FavoriteRecord {
            is_cached: false,
            ..record
        };
        let added = self.shared.update(|list| {
            if list.iter().any(|f| f.job_id == record.job_id) {
                (false, false)
            } else {
                list.insert(0, record.clone());
                (true, true)
            }
        })?;

        if added {
            self.shared.emit(&record.job_id, FavoritesEventKind::Added);
            self.spawn_populate(record);
        }
        Ok(added)
    }

    /// Removes the favorite for `job_id` and its cached image.
    pub fn remove(&self, job_id: &str) -> Result<bool, DatabaseError> {
        let removed = self.shared.update(|list| {
            let before = list.len();
            list.retain(|f| f.job_id != job_id);
            let removed = list.len() != before;
            (removed, removed)
        })?;

        if removed {
            self.shared.remove_blob(job_id);
            self.shared.emit(job_id, FavoritesEventKind::Removed);
        }
        Ok(removed)
    }

    /// Flips the favorite state of `record`.
    ///
    /// When another favorite points at the same media (equal normalized URL)
    /// it is re-keyed to `record`'s job id instead of creating a duplicate.
    pub fn toggle(&self, record: FavoriteRecord) -> Result<ToggleOutcome, DatabaseError> {
        let record = FavoriteRecord {
            is_cached: false,
            ..record
        };
        let change = self.shared.update(|list| {
            if let Some(pos) = list.iter().position(|f| f.job_id == record.job_id) {
                return (true, ToggleChange::Removed(list.remove(pos)));
            }

            let wanted = normalize_url(&record.url);
            match list.iter().position(|f| normalize_url(&f.url) == wanted) {
                Some(pos) => {
                    let from = list.remove(pos);
                    list.insert(0, record.clone());
                    (
                        true,
                        ToggleChange::Rekeyed {
                            from,
                            to: record.clone(),
                        },
                    )
                }
                None => {
                    list.insert(0, record.clone());
                    (true, ToggleChange::Added(record.clone()))
                }
            }
        })?;

        Ok(match change {
            ToggleChange::Removed(old) => {
                self.shared.remove_blob(&old.job_id);
                self.shared.emit(&old.job_id, FavoritesEventKind::Removed);
                ToggleOutcome::Removed
            }
            ToggleChange::Added(new) => {
                self.shared.emit(&new.job_id, FavoritesEventKind::Added);
                self.spawn_populate(new);
                ToggleOutcome::Added
            }
            ToggleChange::Rekeyed { from, to } => {
                log::info!("Re-keyed favorite {} to {}", from.job_id, to.job_id);
                self.shared.emit(
                    &to.job_id,
                    FavoritesEventKind::Rekeyed {
                        from: from.job_id.clone(),
                    },
                );
                self.rekey_blob(&from, to);
                ToggleOutcome::Rekeyed { from: from.job_id }
            }
        })
    }

    /// Moves the cached image along with a re-keyed favorite. Downloads
    /// again only if nothing was cached under the old id.
    fn rekey_blob(&self, from: &FavoriteRecord, to: FavoriteRecord) {
        match self.shared.cache.rekey(&from.job_id, &to.job_id, &to.group_id) {
            Ok(true) => match self.shared.mark_cached(&to.job_id) {
                Ok(true) => self.shared.emit(&to.job_id, FavoritesEventKind::Cached),
                Ok(false) => self.shared.remove_blob(&to.job_id),
                Err(e) => log::warn!("Failed to flag favorite {} as cached: {}", to.job_id, e),
            },
            Ok(false) => self.spawn_populate(to),
            Err(e) => {
                log::warn!("Failed to move cached image {} to {}: {}", from.job_id, to.job_id, e);
                self.spawn_populate(to);
            }
        }
    }

    /// Retries caching for favorites without a durable copy. Favorites whose
    /// blob exists but is not flagged are just flagged. Returns the number of
    /// downloads started.
    pub fn recache_missing(&self) -> usize {
        let mut started = 0;
        for record in self.shared.read() {
            match self.shared.cache.contains(&record.job_id) {
                Ok(true) if record.is_cached => {}
                Ok(true) => {
                    if let Err(e) = self.shared.mark_cached(&record.job_id) {
                        log::warn!("Failed to flag favorite {} as cached: {}", record.job_id, e);
                    }
                }
                Ok(false) => {
                    self.spawn_populate(record);
                    started += 1;
                }
                Err(e) => log::warn!("Failed to check cache for {}: {}", record.job_id, e),
            }
        }
        started
    }

    /// Waits for every background cache task started so far.
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut *self.lock_tasks());
            if pending.is_empty() {
                break;
            }
            for result in join_all(pending).await {
                if let Err(e) = result {
                    log::warn!("Cache task ended abnormally: {}", e);
                }
            }
        }
    }

    fn spawn_populate(&self, record: FavoriteRecord) {
        let Ok(handle) = Handle::try_current() else {
            log::warn!(
                "No async runtime available, skipping cache population for {}",
                record.job_id
            );
            return;
        };
        let shared = Arc::clone(&self.shared);
        let task = handle.spawn(async move { shared.populate(record).await });

        let mut tasks = self.lock_tasks();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Favorites task list lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
