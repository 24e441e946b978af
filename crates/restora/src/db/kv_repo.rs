//! Key-value repository: named string values in the `kv_store` table.
//!
//! Values are opaque to this layer; `store::KvStore` encodes them as JSON.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

/// Reads the raw value stored under `key`.
pub fn get(db: &Database, key: &str) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(value)
    })
}

/// Inserts or replaces the value stored under `key`.
pub fn set(db: &Database, key: &str, value: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    })
}

/// Deletes the value stored under `key`. Returns true if a row was removed.
pub fn delete(db: &Database, key: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let removed = conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    })
}

/// Read-modify-write of a single key inside one transaction.
///
/// `f` receives the current value and returns the value to write (or `None`
/// to leave the row untouched) together with a result passed back to the
/// caller.
pub fn update<F, R>(db: &Database, key: &str, f: F) -> Result<R, DatabaseError>
where
    F: FnOnce(Option<String>) -> (Option<String>, R),
{
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let current: Option<String> = tx
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |r| r.get(0),
            )
            .optional()?;

        let (next, result) = f(current);
        if let Some(value) = next {
            tx.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )?;
        }
        tx.commit()?;
        Ok(result)
    })
}
