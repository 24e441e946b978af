//! In-memory stand-ins for the remote API and image downloads.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use restora::blob_cache::{FetchError, FetchedImage, ImageFetcher};
use restora::remote::error::Result as RemoteResult;
use restora::remote::{HistoryPage, RemoteError, RemoteHistory};

/// How a delete endpoint answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Succeeds the first time, answers not-found afterwards.
    Normal,
    /// Always fails with a server error.
    Fail,
}

#[derive(Default)]
struct HistoryState {
    pages: HashMap<u64, Result<HistoryPage, String>>,
    gates: HashMap<u64, Arc<Notify>>,
    requests: Vec<u64>,
    deleted_jobs: HashSet<String>,
    deleted_groups: HashSet<String>,
    job_delete_calls: Vec<(String, String)>,
}

/// Remote history serving scripted pages per cursor.
///
/// A cursor can be gated: the next request for it blocks until the gate is
/// opened, which lets tests interleave concurrent fetches deterministically.
pub struct ScriptedHistory {
    state: Mutex<HistoryState>,
    job_delete_mode: Mutex<DeleteMode>,
    group_delete_mode: Mutex<DeleteMode>,
}

impl Default for ScriptedHistory {
    fn default() -> Self {
        Self {
            state: Mutex::new(HistoryState::default()),
            job_delete_mode: Mutex::new(DeleteMode::Normal),
            group_delete_mode: Mutex::new(DeleteMode::Normal),
        }
    }
}

impl ScriptedHistory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_page(&self, cursor: u64, page: HistoryPage) {
        self.state.lock().unwrap().pages.insert(cursor, Ok(page));
    }

    pub fn fail_page(&self, cursor: u64, message: &str) {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(cursor, Err(message.to_string()));
    }

    /// Blocks the next request for `cursor` until the returned gate is
    /// notified.
    pub fn gate(&self, cursor: u64) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state
            .lock()
            .unwrap()
            .gates
            .insert(cursor, Arc::clone(&gate));
        gate
    }

    /// Cursors requested so far, in order.
    pub fn requests(&self) -> Vec<u64> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self, cursor: u64) -> usize {
        self.requests().iter().filter(|c| **c == cursor).count()
    }

    /// Yields until a request for `cursor` has arrived `times` times.
    pub async fn wait_for_request(&self, cursor: u64, times: usize) {
        for _ in 0..10_000 {
            if self.request_count(cursor) >= times {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("request for cursor {cursor} never arrived");
    }

    pub fn set_job_delete_mode(&self, mode: DeleteMode) {
        *self.job_delete_mode.lock().unwrap() = mode;
    }

    pub fn set_group_delete_mode(&self, mode: DeleteMode) {
        *self.group_delete_mode.lock().unwrap() = mode;
    }

    pub fn job_delete_calls(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().job_delete_calls.clone()
    }
}

#[async_trait]
impl RemoteHistory for ScriptedHistory {
    async fn fetch_page(&self, cursor: u64, _limit: u32) -> RemoteResult<HistoryPage> {
        let gate = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(cursor);
            state.gates.remove(&cursor)
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let state = self.state.lock().unwrap();
        match state.pages.get(&cursor) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(message)) => Err(RemoteError::Status {
                status: 503,
                body: message.clone(),
            }),
            None => Ok(HistoryPage::default()),
        }
    }

    async fn delete_job(&self, group_id: &str, job_id: &str) -> RemoteResult<()> {
        let mode = *self.job_delete_mode.lock().unwrap();
        let mut state = self.state.lock().unwrap();
        state
            .job_delete_calls
            .push((group_id.to_string(), job_id.to_string()));
        match mode {
            DeleteMode::Fail => Err(RemoteError::Status {
                status: 500,
                body: "internal error".to_string(),
            }),
            DeleteMode::Normal => {
                if state.deleted_jobs.insert(job_id.to_string()) {
                    Ok(())
                } else {
                    Err(RemoteError::NotFound(format!("job {}", job_id)))
                }
            }
        }
    }

    async fn delete_group(&self, group_id: &str) -> RemoteResult<()> {
        let mode = *self.group_delete_mode.lock().unwrap();
        let mut state = self.state.lock().unwrap();
        match mode {
            DeleteMode::Fail => Err(RemoteError::Transport("connection reset".to_string())),
            DeleteMode::Normal => {
                if state.deleted_groups.insert(group_id.to_string()) {
                    Ok(())
                } else {
                    Err(RemoteError::NotFound(format!("group {}", group_id)))
                }
            }
        }
    }
}

/// Image fetcher serving bytes from a map; unknown URLs fail with 403.
#[derive(Default)]
pub struct MemoryImageFetcher {
    images: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<String>>,
}

impl MemoryImageFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, bytes: Vec<u8>) {
        self.images.lock().unwrap().insert(url.to_string(), bytes);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for MemoryImageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.images.lock().unwrap().get(url) {
            Some(bytes) => Ok(FetchedImage {
                bytes: bytes.clone(),
                content_type: None,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 403,
            }),
        }
    }
}
