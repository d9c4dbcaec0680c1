//! Manifest retrieval from remote URLs and local files
//!
//! Every fetch is bounded by the client timeout and aborts early when the
//! controller's cancellation token fires, so a stalled download cannot hold a
//! reconcile worker indefinitely.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::Error;

/// Default timeout for a single manifest download
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Where a manifest stream comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManifestLocator {
    /// Remote manifest retrieved with an HTTP GET
    Url(String),
    /// Manifest file on the local filesystem
    File(PathBuf),
}

impl ManifestLocator {
    /// Interpret a string as a URL when it has an http(s) scheme, else as a path
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Url(raw.to_string())
        } else {
            Self::File(PathBuf::from(raw))
        }
    }
}

impl std::fmt::Display for ManifestLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Trait abstracting manifest retrieval
///
/// Returns the complete body or an error; there is no partial content.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Fetch the raw bytes behind `locator`
    async fn fetch(&self, locator: &ManifestLocator) -> Result<Vec<u8>, Error>;
}

/// Fetcher backed by a shared HTTP client and the local filesystem
pub struct HttpManifestFetcher {
    client: reqwest::Client,
    manifest_dir: PathBuf,
    cancel: CancellationToken,
}

impl HttpManifestFetcher {
    /// Create a fetcher
    ///
    /// Relative file locators resolve against `manifest_dir`. Cancelling
    /// `cancel` aborts in-flight and future fetches.
    pub fn new(
        timeout: Duration,
        manifest_dir: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            manifest_dir: manifest_dir.into(),
            cancel,
        })
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, Error> {
        debug!(url = %url, "fetching manifest");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::fetch(url, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(url, format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::fetch(url, format!("failed to read body: {e}")))?;

        debug!(url = %url, bytes = body.len(), "manifest fetched");
        Ok(body.to_vec())
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, Error> {
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.manifest_dir.join(path)
        };
        debug!(path = %resolved.display(), "reading manifest file");

        tokio::fs::read(&resolved)
            .await
            .map_err(|e| Error::fetch(resolved.display().to_string(), e.to_string()))
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch(&self, locator: &ManifestLocator) -> Result<Vec<u8>, Error> {
        let fetch = async {
            match locator {
                ManifestLocator::Url(url) => self.fetch_url(url).await,
                ManifestLocator::File(path) => self.read_file(path).await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::fetch(locator.to_string(), "fetch cancelled")),
            result = fetch => result,
        }
    }
}
