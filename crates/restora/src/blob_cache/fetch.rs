//! Image download paths: direct fetch and the re-encoding fallback.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::ImageFormat;
use reqwest::{Client, Url};
use thiserror::Error;

/// Default connect timeout for image downloads (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from fetching image bytes.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to '{url}' failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("'{url}' responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("'{url}' returned an empty body")]
    Empty { url: String },

    #[error("Failed to decode image from '{url}': {reason}")]
    Decode { url: String, reason: String },

    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),
}

/// Downloaded bytes plus the reported content type, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Fetches raw image bytes from a URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError>;
}

/// Second-chance path used when the direct fetch fails. Produces an encoded
/// image from a source the direct path could not read.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, url: &str) -> Result<FetchedImage, FetchError>;
}

/// Plain HTTP GET.
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(parsed).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(transport)?;
        if bytes.is_empty() {
            return Err(FetchError::Empty {
                url: url.to_string(),
            });
        }

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

/// Fetches through an optional same-origin proxy, decodes, and re-encodes
/// as PNG. Recovers images the direct path cannot read as-is.
pub struct ReencodingRasterizer {
    fetcher: Arc<dyn ImageFetcher>,
    proxy: Option<Url>,
}

impl ReencodingRasterizer {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, proxy: Option<Url>) -> Self {
        Self { fetcher, proxy }
    }

    /// URL actually requested for `url`: the proxy with `?url=` appended, or
    /// `url` itself.
    pub fn source_for(&self, url: &str) -> String {
        match &self.proxy {
            Some(proxy) => {
                let mut target = proxy.clone();
                target.query_pairs_mut().append_pair("url", url);
                target.to_string()
            }
            None => url.to_string(),
        }
    }
}

#[async_trait]
impl Rasterizer for ReencodingRasterizer {
    async fn rasterize(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let source = self.source_for(url);
        let fetched = self.fetcher.fetch(&source).await?;

        let owned_url = url.to_string();
        let bytes = tokio::task::spawn_blocking(move || reencode_png(&fetched.bytes))
            .await
            .map_err(|e| FetchError::Decode {
                url: owned_url.clone(),
                reason: e.to_string(),
            })?
            .map_err(|reason| FetchError::Decode {
                url: owned_url,
                reason,
            })?;

        Ok(FetchedImage {
            bytes,
            content_type: Some("image/png".to_string()),
        })
    }
}

fn reencode_png(bytes: &[u8]) -> Result<Vec<u8>, String> {
    let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(out)
}
