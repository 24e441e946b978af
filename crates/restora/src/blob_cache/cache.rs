//! Durable image cache keyed by job id.

use std::io::Cursor;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;

use super::display::{DisplayUrl, DisplayUrlRegistry};
use super::fetch::{FetchError, FetchedImage, ImageFetcher, Rasterizer};
use crate::db::blob_repo::{self, BlobStats, CachedImageRow};
use crate::db::{Database, DatabaseError};

/// Errors from the blob cache.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Neither the direct fetch nor the fallback produced bytes.
    #[error("Could not obtain image from '{url}': {direct}; fallback: {fallback}")]
    Unavailable {
        url: String,
        #[source]
        direct: FetchError,
        fallback: String,
    },
}

/// What to cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest {
    pub job_id: String,
    pub group_id: String,
    pub source_url: String,
    pub created_at: DateTime<Utc>,
    pub label: Option<String>,
}

/// A cached image with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedImage {
    pub job_id: String,
    pub group_id: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub source_url: String,
    pub created_at: DateTime<Utc>,
    pub cached_at: DateTime<Utc>,
    pub label: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mime_type: Option<String>,
}

impl CachedImage {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    fn from_row(row: CachedImageRow) -> Self {
        Self {
            created_at: parse_timestamp(&row.job_id, &row.created_at),
            cached_at: parse_timestamp(&row.job_id, &row.cached_at),
            job_id: row.job_id,
            group_id: row.group_id,
            bytes: row.data,
            source_url: row.source_url,
            label: row.label,
            width: row.width,
            height: row.height,
            mime_type: row.mime_type,
        }
    }

    fn to_row(&self) -> CachedImageRow {
        CachedImageRow {
            job_id: self.job_id.clone(),
            group_id: self.group_id.clone(),
            data: self.bytes.clone(),
            source_url: self.source_url.clone(),
            created_at: self.created_at.to_rfc3339(),
            cached_at: self.cached_at.to_rfc3339(),
            label: self.label.clone(),
            width: self.width,
            height: self.height,
            mime_type: self.mime_type.clone(),
        }
    }
}

fn parse_timestamp(job_id: &str, raw: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => t.with_timezone(&Utc),
        Err(e) => {
            log::warn!("Invalid timestamp '{}' on cached image {}: {}", raw, job_id, e);
            DateTime::<Utc>::default()
        }
    }
}

/// Persistent image cache for favorited jobs.
///
/// Entries never expire on their own; they are removed when the favorite
/// goes away. Storing twice under one id overwrites.
pub struct BlobCache {
    db: Database,
    fetcher: Arc<dyn ImageFetcher>,
    rasterizer: Option<Arc<dyn Rasterizer>>,
    display: DisplayUrlRegistry,
}

impl BlobCache {
    pub fn new(db: Database, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            db,
            fetcher,
            rasterizer: None,
            display: DisplayUrlRegistry::new(),
        }
    }

    /// Enables the fallback path used when the direct fetch fails.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn get(&self, job_id: &str) -> Result<Option<CachedImage>, CacheError> {
        Ok(blob_repo::find_by_id(&self.db, job_id)?.map(CachedImage::from_row))
    }

    pub fn contains(&self, job_id: &str) -> Result<bool, CacheError> {
        Ok(self.get(job_id)?.is_some())
    }

    /// All entries, most recently cached first.
    pub fn list(&self) -> Result<Vec<CachedImage>, CacheError> {
        Ok(blob_repo::list(&self.db)?
            .into_iter()
            .map(CachedImage::from_row)
            .collect())
    }

    /// Downloads, measures and stores the image for `request`.
    pub async fn put(&self, request: &CacheRequest) -> Result<CachedImage, CacheError> {
        let span = tracing::info_span!("cache_put", job_id = %request.job_id);
        async {
            let fetched = self.download(&request.source_url).await?;
            let dimensions = measure(&fetched.bytes);
            let mime_type = detect_mime(&request.source_url, &fetched);

            let image = CachedImage {
                job_id: request.job_id.clone(),
                group_id: request.group_id.clone(),
                source_url: request.source_url.clone(),
                created_at: request.created_at,
                cached_at: Utc::now(),
                label: request.label.clone(),
                width: dimensions.map(|(w, _)| w),
                height: dimensions.map(|(_, h)| h),
                mime_type,
                bytes: fetched.bytes,
            };
            blob_repo::upsert(&self.db, &image.to_row())?;
            log::info!(
                "Cached image for job {} ({} bytes)",
                image.job_id,
                image.size()
            );
            Ok::<_, CacheError>(image)
        }
        .instrument(span)
        .await
    }

    /// Removes the entry. Absent entries are not an error.
    pub fn delete(&self, job_id: &str) -> Result<bool, CacheError> {
        let removed = blob_repo::delete(&self.db, job_id)?;
        if removed {
            log::debug!("Removed cached image for job {}", job_id);
        }
        Ok(removed)
    }

    /// Moves an entry to a new job id. Returns false if nothing was cached
    /// under `old_id`.
    pub fn rekey(&self, old_id: &str, new_id: &str, group_id: &str) -> Result<bool, CacheError> {
        Ok(blob_repo::rekey(&self.db, old_id, new_id, group_id)?)
    }

    pub fn stats(&self) -> Result<BlobStats, CacheError> {
        Ok(blob_repo::stats(&self.db)?)
    }

    /// Creates a display handle for the cached bytes of `job_id`.
    pub fn display_url(&self, job_id: &str) -> Result<Option<DisplayUrl>, CacheError> {
        Ok(self
            .get(job_id)?
            .map(|image| self.display.create(image.bytes, image.mime_type)))
    }

    pub fn display_registry(&self) -> &DisplayUrlRegistry {
        &self.display
    }

    async fn download(&self, url: &str) -> Result<FetchedImage, CacheError> {
        let direct = match self.fetcher.fetch(url).await {
            Ok(image) if image.bytes.is_empty() => FetchError::Empty {
                url: url.to_string(),
            },
            Ok(image) => return Ok(image),
            Err(e) => e,
        };

        let Some(rasterizer) = &self.rasterizer else {
            return Err(CacheError::Unavailable {
                url: url.to_string(),
                direct,
                fallback: "no fallback configured".to_string(),
            });
        };

        log::debug!("Direct fetch of {} failed ({}), trying fallback", url, direct);
        match rasterizer.rasterize(url).await {
            Ok(image) if !image.bytes.is_empty() => {
                log::info!("Recovered {} through the fallback path", url);
                Ok(image)
            }
            Ok(_) => Err(CacheError::Unavailable {
                url: url.to_string(),
                direct,
                fallback: "empty result".to_string(),
            }),
            Err(e) => Err(CacheError::Unavailable {
                url: url.to_string(),
                direct,
                fallback: e.to_string(),
            }),
        }
    }
}

/// Pixel dimensions, if the bytes are a recognizable image.
fn measure(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// MIME type from the response header, else the URL path, else the bytes.
fn detect_mime(url: &str, fetched: &FetchedImage) -> Option<String> {
    let from_header = fetched
        .content_type
        .as_deref()
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| ct.starts_with("image/"));
    if from_header.is_some() {
        return from_header;
    }

    let path = reqwest::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.split(['?', '#']).next().unwrap_or(url).to_string());
    let from_path = mime_guess::from_path(&path)
        .first()
        .filter(|m| m.type_() == mime_guess::mime::IMAGE)
        .map(|m| m.essence_str().to_string());
    if from_path.is_some() {
        return from_path;
    }

    image::guess_format(&fetched.bytes)
        .ok()
        .map(|f| f.to_mime_type().to_string())
}
