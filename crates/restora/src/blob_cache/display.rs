//! Process-local display handles for cached bytes.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

/// Scheme prefix of every handle this registry hands out.
pub const DISPLAY_URL_PREFIX: &str = "blob:restora/";

/// Bytes behind a live handle.
#[derive(Debug, Clone)]
pub struct DisplayBlob {
    pub bytes: Arc<Vec<u8>>,
    pub mime_type: Option<String>,
}

/// Registry of live display handles. Handles only exist for the lifetime of
/// the process; nothing here is persisted.
#[derive(Clone, Default)]
pub struct DisplayUrlRegistry {
    entries: Arc<Mutex<HashMap<String, DisplayBlob>>>,
}

impl DisplayUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `bytes` and returns the guard owning the handle.
    pub fn create(&self, bytes: Vec<u8>, mime_type: Option<String>) -> DisplayUrl {
        let url = format!("{}{}", DISPLAY_URL_PREFIX, Uuid::new_v4());
        self.lock().insert(
            url.clone(),
            DisplayBlob {
                bytes: Arc::new(bytes),
                mime_type,
            },
        );
        DisplayUrl {
            url,
            registry: self.clone(),
            released: false,
        }
    }

    /// Looks up a live handle.
    pub fn resolve(&self, url: &str) -> Option<DisplayBlob> {
        self.lock().get(url).cloned()
    }

    /// Number of handles not yet released.
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn revoke(&self, url: &str) -> bool {
        self.lock().remove(url).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DisplayBlob>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Display URL registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// A temporary handle to cached bytes. Release it when the image is no
/// longer shown; dropping it releases it too.
pub struct DisplayUrl {
    url: String,
    registry: DisplayUrlRegistry,
    released: bool,
}

impl DisplayUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn release(mut self) {
        self.revoke_once();
    }

    fn revoke_once(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.revoke(&self.url);
        }
    }
}

impl Drop for DisplayUrl {
    fn drop(&mut self) {
        self.revoke_once();
    }
}

impl fmt::Debug for DisplayUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayUrl")
            .field("url", &self.url)
            .field("released", &self.released)
            .finish()
    }
}

impl fmt::Display for DisplayUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
