//! JSON-valued key store with change notification.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::broadcast::{ChangeBus, StorageEvent};
use crate::db::{kv_repo, Database, DatabaseError};

/// Persisted named values shared by every component of a session.
///
/// Values are JSON documents. A value that fails to parse is reported as
/// absent (and logged), never as an error: a corrupted list must not take the
/// client down. Every write publishes a [`StorageEvent`].
#[derive(Clone)]
pub struct KvStore {
    db: Database,
    events: ChangeBus<StorageEvent>,
}

impl KvStore {
    /// Clones share one change bus, so every component built from the same
    /// store sees the others' writes.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            events: ChangeBus::default(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Subscribes to storage-change notifications.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    /// Reads and decodes `key`. Missing and malformed values both yield `None`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DatabaseError> {
        let raw = kv_repo::get(&self.db, key)?;
        Ok(raw.and_then(|s| decode(key, &s)))
    }

    /// Encodes and writes `value` under `key`.
    pub fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        origin: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let encoded = serde_json::to_string(value).map_err(|e| DatabaseError::Encode {
            key: key.to_string(),
            source: e,
        })?;
        kv_repo::set(&self.db, key, &encoded)?;
        self.notify(key, origin);
        Ok(())
    }

    /// Atomic read-modify-write of a JSON value.
    ///
    /// `f` sees the decoded current value (`T::default()` when missing or
    /// malformed) and returns whether it changed anything plus a result for
    /// the caller. The value is written, and a change published, only when
    /// `f` reports a change.
    pub fn update_json<T, R, F>(&self, key: &str, origin: Option<&str>, f: F) -> Result<R, DatabaseError>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T) -> (bool, R),
    {
        let mut encode_error = None;
        let (changed, result) = kv_repo::update(&self.db, key, |current| {
            let mut value: T = current
                .as_deref()
                .and_then(|s| decode(key, s))
                .unwrap_or_default();
            let (changed, result) = f(&mut value);
            if !changed {
                return (None, (false, result));
            }
            match serde_json::to_string(&value) {
                Ok(encoded) => (Some(encoded), (true, result)),
                Err(e) => {
                    encode_error = Some(e);
                    (None, (false, result))
                }
            }
        })?;

        if let Some(e) = encode_error {
            return Err(DatabaseError::Encode {
                key: key.to_string(),
                source: e,
            });
        }
        if changed {
            self.notify(key, origin);
        }
        Ok(result)
    }

    /// Removes `key`.
    pub fn remove(&self, key: &str, origin: Option<&str>) -> Result<bool, DatabaseError> {
        let removed = kv_repo::delete(&self.db, key)?;
        if removed {
            self.notify(key, origin);
        }
        Ok(removed)
    }

    fn notify(&self, key: &str, origin: Option<&str>) {
        self.events.send(StorageEvent {
            key: key.to_string(),
            origin: origin.map(str::to_string),
        });
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Ignoring malformed value stored under '{}': {}", key, e);
            None
        }
    }
}
