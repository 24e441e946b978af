//! Cached image repository: CRUD operations for the `cached_images` table.

use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use super::{Database, DatabaseError};

/// A raw cached image row from the database.
#[derive(Debug, Clone)]
pub struct CachedImageRow {
    pub job_id: String,
    pub group_id: String,
    pub data: Vec<u8>,
    pub source_url: String,
    pub created_at: String,
    pub cached_at: String,
    pub label: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mime_type: Option<String>,
}

impl CachedImageRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            job_id: row.get("job_id")?,
            group_id: row.get("group_id")?,
            data: row.get("data")?,
            source_url: row.get("source_url")?,
            created_at: row.get("created_at")?,
            cached_at: row.get("cached_at")?,
            label: row.get("label")?,
            width: row.get("width")?,
            height: row.get("height")?,
            mime_type: row.get("mime_type")?,
        })
    }
}

/// Aggregate size of the cache, for callers deciding whether to evict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobStats {
    pub count: u64,
    pub total_bytes: u64,
}

/// Inserts a row, replacing any existing row with the same job id.
pub fn upsert(db: &Database, row: &CachedImageRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR REPLACE INTO cached_images (job_id, group_id, data, source_url,
             created_at, cached_at, label, width, height, mime_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                row.job_id,
                row.group_id,
                row.data,
                row.source_url,
                row.created_at,
                row.cached_at,
                row.label,
                row.width,
                row.height,
                row.mime_type,
            ],
        )?;
        Ok(())
    })
}

/// Finds a cached image by job id.
pub fn find_by_id(db: &Database, job_id: &str) -> Result<Option<CachedImageRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM cached_images WHERE job_id = ?1",
                params![job_id],
                CachedImageRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists all cached images, most recently cached first.
pub fn list(db: &Database) -> Result<Vec<CachedImageRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM cached_images ORDER BY cached_at DESC, job_id ASC")?;
        let rows = stmt
            .query_map([], CachedImageRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Deletes a cached image. Returns true if a row was removed.
pub fn delete(db: &Database, job_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let removed = conn.execute(
            "DELETE FROM cached_images WHERE job_id = ?1",
            params![job_id],
        )?;
        Ok(removed > 0)
    })
}

/// Moves a cached image to a new job id, replacing any row already stored
/// under the new id. Returns false if nothing was stored under `old_id`.
pub fn rekey(
    db: &Database,
    old_id: &str,
    new_id: &str,
    group_id: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let moved = conn.execute(
            "UPDATE OR REPLACE cached_images SET job_id = ?2, group_id = ?3 WHERE job_id = ?1",
            params![old_id, new_id, group_id],
        )?;
        Ok(moved > 0)
    })
}

/// Returns the number of cached images and their total payload size.
pub fn stats(db: &Database) -> Result<BlobStats, DatabaseError> {
    db.with_conn(|conn| {
        let (count, total_bytes): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(length(data)), 0) FROM cached_images",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok(BlobStats {
            count: count.max(0) as u64,
            total_bytes: total_bytes.max(0) as u64,
        })
    })
}
