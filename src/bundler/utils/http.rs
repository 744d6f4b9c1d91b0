//! HTTP downloads for support packages and stub binaries.
//!
//! The pipeline only talks to the [`Downloader`] trait; [`HttpDownloader`]
//! is the reqwest-backed implementation used by the binary.

use crate::bundler::error::{Error, ErrorExt, Result};
use futures_lite::StreamExt;
use std::{path::Path, time::Duration};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;
use url::Url;

/// Fetches remote artifacts to local files.
#[async_trait::async_trait]
pub trait Downloader: Send + Sync {
    /// Downloads `url` to `dest`, replacing any existing file.
    async fn download(&self, url: &Url, dest: &Path) -> Result<()>;
}

/// Streaming reqwest downloader with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpDownloader {
    /// Creates a downloader whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::GenericError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait::async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &Url, dest: &Path) -> Result<()> {
        log::info!("Downloading {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fetch_error(url, e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                url: url.to_string(),
                reason: format!("server responded with {}", status),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .fs_context("creating download directory", parent)?;
        }

        // Stream into a scratch file so a failed transfer never leaves a
        // truncated archive at `dest`.
        let partial = dest.with_extension("download");
        let mut file = tokio::fs::File::create(&partial)
            .await
            .fs_context("creating download file", &partial)?;
        let stream = response.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other));
        let mut reader = StreamReader::new(Box::pin(stream));
        tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| Error::Fetch {
                url: url.to_string(),
                reason: format!("Failed to read response: {}", e),
            })?;
        file.flush()
            .await
            .fs_context("writing download file", &partial)?;
        drop(file);

        tokio::fs::rename(&partial, dest)
            .await
            .fs_context("moving download into place", dest)?;
        Ok(())
    }
}

fn fetch_error(url: &Url, error: reqwest::Error, timeout: Duration) -> Error {
    if error.is_timeout() {
        Error::Timeout {
            command: url.to_string(),
            seconds: timeout.as_secs(),
        }
    } else {
        Error::Fetch {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}
