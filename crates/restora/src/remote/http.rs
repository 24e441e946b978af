//! reqwest-backed implementation of [`RemoteHistory`].

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};

use super::error::{RemoteError, Result};
use super::{HistoryPage, RemoteHistory};

/// Maximum length for error bodies kept in errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", head)
    } else {
        body.to_string()
    }
}

/// History API client.
///
/// Endpoints, relative to the configured base URL:
/// - `GET  v1/history?offset={cursor}&limit={limit}`
/// - `DELETE v1/groups/{group}/jobs/{job}`
/// - `DELETE v1/groups/{group}`
pub struct HttpHistoryClient {
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl HttpHistoryClient {
    /// Creates a client for `base_url` with the given request timeout.
    pub fn new(base_url: &str, api_key: Option<SecretString>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RemoteError::Config(format!("Invalid base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Config(format!(
                "Base URL '{}' cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Builds an endpoint URL by appending percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Config(format!("Base URL '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    async fn check(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(what.to_string()));
        }
        Err(RemoteError::Status {
            status: status.as_u16(),
            body: truncate_body(&body),
        })
    }
}

#[async_trait]
impl RemoteHistory for HttpHistoryClient {
    async fn fetch_page(&self, cursor: u64, limit: u32) -> Result<HistoryPage> {
        let url = self.endpoint(&["v1", "history"])?;
        debug!("Fetching history page at offset {} (limit {})", cursor, limit);

        let response = self
            .authorize(self.client.get(url))
            .query(&[("offset", cursor.to_string()), ("limit", limit.to_string())])
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let response = Self::check(response, "history").await?;
        response
            .json::<HistoryPage>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn delete_job(&self, group_id: &str, job_id: &str) -> Result<()> {
        let url = self.endpoint(&["v1", "groups", group_id, "jobs", job_id])?;
        let response = self
            .authorize(self.client.delete(url))
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Self::check(response, &format!("job {}/{}", group_id, job_id)).await?;
        info!("Deleted job {} from group {}", job_id, group_id);
        Ok(())
    }

    async fn delete_group(&self, group_id: &str) -> Result<()> {
        let url = self.endpoint(&["v1", "groups", group_id])?;
        let response = self
            .authorize(self.client.delete(url))
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Self::check(response, &format!("group {}", group_id)).await?;
        info!("Deleted group {}", group_id);
        Ok(())
    }
}
