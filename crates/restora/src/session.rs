//! Wires the components of one client session.

use std::sync::Arc;

use reqwest::Url;

use crate::blob_cache::{BlobCache, HttpImageFetcher, ImageFetcher, ReencodingRasterizer};
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::db::Database;
use crate::error::{ConfigError, Result};
use crate::favorites::FavoritesIndex;
use crate::history::{HistoryReconciler, JobMapper, ReconcilerSettings};
use crate::remote::{HttpHistoryClient, RemoteHistory};
use crate::store::{HiddenJobStore, KvStore};

/// One database, one reconciler, one favorites index.
pub struct Session {
    db: Database,
    store: KvStore,
    history: Arc<HistoryReconciler>,
    favorites: FavoritesIndex,
}

impl Session {
    /// Opens the configured database and builds the HTTP clients.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let path = config
            .cache
            .resolved_database_path()
            .ok_or_else(|| ConfigError::Validation {
                message: "Cannot determine database path (no home directory)".to_string(),
            })?;
        let db = Database::open(&path)?;

        let api_key = config.api.resolve_api_key()?;
        if api_key.is_none() {
            log::warn!("No API key configured; requests are sent unauthenticated");
        }
        let remote = HttpHistoryClient::new(&config.api.base_url, api_key, config.api.timeout())?;

        let fetcher: Arc<dyn ImageFetcher> =
            Arc::new(HttpImageFetcher::new(config.cache.download_timeout())?);
        let proxy = match config.cache.image_proxy_url.as_deref() {
            Some(raw) => Some(Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
                field: "cache.imageProxyUrl".to_string(),
                reason: e.to_string(),
            })?),
            None => None,
        };
        let cache = BlobCache::new(db.clone(), Arc::clone(&fetcher))
            .with_rasterizer(Arc::new(ReencodingRasterizer::new(fetcher, proxy)));

        Ok(Self::assemble(
            db,
            Arc::new(remote),
            Arc::new(cache),
            JobMapper::new(config.history.model_ids.iter().cloned()),
            Arc::new(SystemClock),
            config.history.settings(),
        ))
    }

    /// Builds a session from prepared parts.
    pub fn assemble(
        db: Database,
        remote: Arc<dyn RemoteHistory>,
        cache: Arc<BlobCache>,
        mapper: JobMapper,
        clock: Arc<dyn Clock>,
        settings: ReconcilerSettings,
    ) -> Self {
        let store = KvStore::new(db.clone());
        let history = Arc::new(HistoryReconciler::new(
            remote,
            HiddenJobStore::new(store.clone()),
            mapper,
            clock,
            settings,
        ));
        let favorites = FavoritesIndex::new(store.clone(), cache);
        Self {
            db,
            store,
            history,
            favorites,
        }
    }

    pub fn history(&self) -> &Arc<HistoryReconciler> {
        &self.history
    }

    pub fn favorites(&self) -> &FavoritesIndex {
        &self.favorites
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Waits for background cache work before the session goes away.
    pub async fn shutdown(&self) {
        self.favorites.settle().await;
        log::info!("Session closed");
    }
}
