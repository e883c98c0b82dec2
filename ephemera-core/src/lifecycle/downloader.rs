//! Streaming HTTP downloads with progress reporting and URL validation.
//!
//! The acquirer talks to the network only through the [`Fetcher`] trait so
//! tests can serve payloads from memory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::config::{LifecycleConfig, DEFAULT_READ_TIMEOUT_SECS};

// ============================================================================
// Fetcher Interface
// ============================================================================

/// Downloads a URL to a local file, returning the number of bytes written.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}

// ============================================================================
// URL Validation
// ============================================================================

/// Checks that a URL parses, has a host and uses one of `allowed_schemes`.
pub fn validate_url(url_str: &str, allowed_schemes: &[String]) -> Result<Url> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid URL: {}", url_str))?;

    if !allowed_schemes
        .iter()
        .any(|s| s.eq_ignore_ascii_case(url.scheme()))
    {
        anyhow::bail!(
            "URL scheme '{}' not allowed (allowed: {:?}): {}",
            url.scheme(),
            allowed_schemes,
            url_str
        );
    }

    if url.host_str().map_or(true, str::is_empty) {
        anyhow::bail!("URL must have a host: {}", url_str);
    }

    Ok(url)
}

// ============================================================================
// Download Progress
// ============================================================================

/// Progress information during a download.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    /// Bytes downloaded so far.
    pub bytes_downloaded: u64,
    /// Total bytes expected (if known from Content-Length header).
    pub total_bytes: Option<u64>,
    /// Progress percentage (0.0 to 100.0), or None if total is unknown.
    pub percent: Option<f32>,
}

impl DownloadProgress {
    fn new(bytes_downloaded: u64, total_bytes: Option<u64>) -> Self {
        let percent = total_bytes.map(|total| {
            if total > 0 {
                (bytes_downloaded as f32 / total as f32) * 100.0
            } else {
                0.0
            }
        });

        Self {
            bytes_downloaded,
            total_bytes,
            percent,
        }
    }
}

/// Callback invoked as chunks arrive.
pub type ProgressCallback = Arc<dyn Fn(DownloadProgress) + Send + Sync>;

// ============================================================================
// HTTP Fetcher
// ============================================================================

/// `Fetcher` backed by a reqwest client.
pub struct HttpFetcher {
    client: reqwest::Client,
    allowed_schemes: Vec<String>,
    read_timeout: Duration,
    progress: Option<ProgressCallback>,
}

impl HttpFetcher {
    pub fn new(config: &LifecycleConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::with_client(client, config.allowed_schemes.clone())
            .with_read_timeout(config.read_timeout()))
    }

    pub fn with_client(client: reqwest::Client, allowed_schemes: Vec<String>) -> Self {
        Self {
            client,
            allowed_schemes,
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            progress: None,
        }
    }

    /// Fails the transfer when headers or the next body chunk take longer
    /// than `timeout` to arrive.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Reports download progress to `callback`.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(DownloadProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    fn report(&self, progress: DownloadProgress) {
        if let Some(cb) = &self.progress {
            cb(progress);
        }
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = tokio::time::timeout(self.read_timeout, self.client.get(url).send())
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "Timed out after {:?} waiting for a response from {}",
                    self.read_timeout,
                    url
                )
            })?
            .with_context(|| format!("Failed to start download from {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!(
                "Download failed with status {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown error")
            );
        }

        let total_bytes = response.content_length();
        debug!("Content-Length: {:?}", total_bytes);

        let mut file = File::create(dest)
            .await
            .with_context(|| format!("Failed to create file: {}", dest.display()))?;

        let mut stream = response.bytes_stream();
        let mut bytes_downloaded: u64 = 0;

        self.report(DownloadProgress::new(0, total_bytes));

        loop {
            let next = tokio::time::timeout(self.read_timeout, stream.next())
                .await
                .map_err(|_| {
                    anyhow::anyhow!(
                        "Download stalled: no data for {:?} after {} bytes",
                        self.read_timeout,
                        bytes_downloaded
                    )
                })?;
            let Some(chunk_result) = next else {
                break;
            };
            let chunk = chunk_result.context("Failed to read chunk from response stream")?;

            file.write_all(&chunk)
                .await
                .context("Failed to write chunk to file")?;

            bytes_downloaded += chunk.len() as u64;
            self.report(DownloadProgress::new(bytes_downloaded, total_bytes));
        }

        file.flush().await.context("Failed to flush file")?;

        if let Some(total) = total_bytes {
            if bytes_downloaded < total {
                anyhow::bail!(
                    "Download truncated: received {} of {} bytes",
                    bytes_downloaded,
                    total
                );
            }
        }

        if bytes_downloaded == 0 {
            anyhow::bail!("Downloaded file is empty (0 bytes)");
        }

        Ok(bytes_downloaded)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("Downloading {} to {}", url, dest.display());

        validate_url(url, &self.allowed_schemes)?;

        match self.stream_to_file(url, dest).await {
            Ok(bytes) => {
                info!(
                    "Download complete: {} bytes written to {}",
                    bytes,
                    dest.display()
                );
                Ok(bytes)
            }
            Err(e) => {
                // Partial file; the workspace is reclaimed anyway.
                let _ = tokio::fs::remove_file(dest).await;
                Err(e)
            }
        }
    }
}
