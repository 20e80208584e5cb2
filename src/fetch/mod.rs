//! HTTP fetching and file placement.
//!
//! Strategies talk to the network only through the [`Fetch`] trait so the
//! batch can run against a real client or a scripted one. Non-200 statuses
//! are returned to the caller, never raised.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

use crate::config::HttpConfig;

/// Errors that can occur during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Result of saving a URL to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Body written; the byte count may be zero
    Written { bytes: u64 },
    /// Server answered with a non-200 status; nothing was written
    Status(u16),
}

/// Capability to fetch URLs.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// GET a URL and buffer the body.
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError>;

    /// GET a URL and write the body to `path` if the status is 200.
    async fn save_to(&self, url: &str, path: &Path) -> Result<SaveOutcome, FetchError> {
        let response = self.get(url).await?;
        if !response.is_ok() {
            return Ok(SaveOutcome::Status(response.status));
        }
        if let Err(e) = fs::write(path, &response.body).await {
            remove_partial(path).await;
            return Err(e.into());
        }
        Ok(SaveOutcome::Written {
            bytes: response.body.len() as u64,
        })
    }
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Request timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        HttpConfig::default().into()
    }
}

impl From<HttpConfig> for FetcherConfig {
    fn from(http: HttpConfig) -> Self {
        Self {
            timeout: Duration::from_secs(http.timeout_seconds),
            user_agent: http.user_agent,
        }
    }
}

/// reqwest-backed fetcher that streams downloads to disk.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("saved-media/0.1.0")),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    /// Create a fetcher with default configuration.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(FetcherConfig::default())
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(FetchResponse {
            url: url.to_string(),
            status,
            body,
        })
    }

    async fn save_to(&self, url: &str, path: &Path) -> Result<SaveOutcome, FetchError> {
        debug!("GET {} -> {}", url, path.display());
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Ok(SaveOutcome::Status(status.as_u16()));
        }

        let mut file = fs::File::create(path).await?;
        match stream_body(&mut response, &mut file).await {
            Ok(bytes) => Ok(SaveOutcome::Written { bytes }),
            Err(e) => {
                drop(file);
                remove_partial(path).await;
                Err(e)
            }
        }
    }
}

async fn stream_body(
    response: &mut reqwest::Response,
    file: &mut fs::File,
) -> Result<u64, FetchError> {
    let mut bytes = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        bytes += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(bytes)
}

/// Remove a file left behind by an interrupted download.
async fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove partial download {}: {}", path.display(), e);
        }
    }
}

/// Extension of the URL's path including the dot, e.g. `.jpg`.
///
/// Query strings and fragments are ignored. Returns `None` when the last
/// path segment has no extension.
pub fn url_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext))
}

/// First free path of the form `stem.ext`, `stem_01.ext`, `stem_02.ext`, ...
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut num = 1u32;
    loop {
        let candidate = path.with_file_name(format!("{}_{:02}{}", stem, num, ext));
        if !candidate.exists() {
            return candidate;
        }
        num += 1;
    }
}
