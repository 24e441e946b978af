//! Test harness wiring a session to in-memory fakes.

#![allow(dead_code)]

use std::sync::Arc;

use restora::blob_cache::{BlobCache, ImageFetcher, ReencodingRasterizer};
use restora::clock::ManualClock;
use restora::db::Database;
use restora::favorites::FavoritesIndex;
use restora::history::{HistoryReconciler, JobMapper, ReconcilerSettings};
use restora::remote::RemoteHistory;
use restora::session::Session;
use restora::store::{HiddenJobStore, KvStore};

use super::builders::start_time;
use super::fakes::{MemoryImageFetcher, ScriptedHistory};

/// A session over an in-memory database with scripted remotes and a
/// manual clock.
pub struct TestHarness {
    pub session: Session,
    pub remote: Arc<ScriptedHistory>,
    pub fetcher: Arc<MemoryImageFetcher>,
    pub clock: Arc<ManualClock>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::build(JobMapper::default(), None)
    }

    /// Only jobs from `models` are accepted.
    pub fn with_models(models: &[&str]) -> Self {
        Self::build(JobMapper::new(models.iter().copied()), None)
    }

    /// Enables the fallback download path through `proxy`.
    pub fn with_proxy(proxy: &str) -> Self {
        Self::build(JobMapper::default(), Some(proxy.to_string()))
    }

    fn build(mapper: JobMapper, proxy: Option<String>) -> Self {
        let db = Database::open_in_memory().expect("open in-memory DB");
        let remote = ScriptedHistory::new();
        let fetcher = MemoryImageFetcher::new();
        let clock = Arc::new(ManualClock::new(start_time()));

        let mut cache = BlobCache::new(db.clone(), fetcher.clone() as Arc<dyn ImageFetcher>);
        if let Some(proxy) = proxy {
            let proxy = reqwest::Url::parse(&proxy).expect("valid proxy url");
            cache = cache.with_rasterizer(Arc::new(ReencodingRasterizer::new(
                fetcher.clone() as Arc<dyn ImageFetcher>,
                Some(proxy),
            )));
        }

        let session = Session::assemble(
            db,
            remote.clone() as Arc<dyn RemoteHistory>,
            Arc::new(cache),
            mapper,
            clock.clone(),
            ReconcilerSettings::default(),
        );
        Self {
            session,
            remote,
            fetcher,
            clock,
        }
    }

    pub fn history(&self) -> &Arc<HistoryReconciler> {
        self.session.history()
    }

    pub fn favorites(&self) -> &FavoritesIndex {
        self.session.favorites()
    }

    pub fn cache(&self) -> &Arc<BlobCache> {
        self.session.favorites().cache()
    }

    /// Override store as seen by another instance sharing the database.
    pub fn other_instance_overrides(&self) -> HiddenJobStore {
        HiddenJobStore::new(KvStore::new(self.session.database().clone()))
    }

    /// A second reconciler over the same database and remote, as after a
    /// reload.
    pub fn reloaded_history(&self) -> HistoryReconciler {
        self.history_with_settings(ReconcilerSettings::default())
    }

    /// Like [`Self::reloaded_history`], with custom paging and retention.
    pub fn history_with_settings(&self, settings: ReconcilerSettings) -> HistoryReconciler {
        HistoryReconciler::new(
            self.remote.clone(),
            self.other_instance_overrides(),
            JobMapper::default(),
            self.clock.clone(),
            settings,
        )
    }
}
