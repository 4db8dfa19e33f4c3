//! Progress-tracked download through the relay's proxy route.
//!
//! The body is read chunk by chunk into a growing buffer and a progress
//! snapshot is emitted after every chunk. The stream is owned by the reading
//! routine, so it is released on every exit path including errors.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use reqwest::header::CONTENT_LENGTH;
use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::naming;

// Upper bound on the up-front reservation; a bogus content-length must not
// trigger a huge allocation.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DownloadProgress {
    pub loaded: u64,
    /// Zero when the server did not announce a length.
    pub total: u64,
    pub percentage: u8,
}

impl DownloadProgress {
    pub fn new(loaded: u64, total: u64) -> Self {
        let percentage = if total > 0 {
            ((loaded as f64 / total as f64) * 100.0).round().min(100.0) as u8
        } else {
            0
        };

        Self {
            loaded,
            total,
            percentage,
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Download failed: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Download stream failed after {loaded} bytes: {source}")]
    Stream {
        loaded: u64,
        #[source]
        source: BoxError,
    },

    #[error("Could not save {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not open {url} directly: {source}")]
    Fallback {
        url: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved { path: PathBuf, bytes: u64 },
    /// The proxy was unreachable and the original URL was handed to the
    /// system opener instead.
    OpenedExternally { url: String },
}

/// Opens a URL outside this process, typically in the default browser.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

// Each launcher receives the URL as one argument and no shell parses it.
fn open_command(url: &str) -> Command {
    let program = if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };

    let mut command = Command::new(program);
    command.arg(url);
    command
}

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> io::Result<()> {
        open_command(url).spawn().map(|_| ())
    }
}

/// Drains `stream`, reporting progress after each chunk, and returns the
/// assembled payload.
pub async fn collect_with_progress<S, E>(
    stream: S,
    total: u64,
    mut on_progress: impl FnMut(DownloadProgress),
) -> Result<Bytes, DownloadError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let mut stream = std::pin::pin!(stream);
    let mut buffer = BytesMut::with_capacity(total.min(MAX_PREALLOCATION) as usize);
    let mut loaded = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| DownloadError::Stream {
            loaded,
            source: source.into(),
        })?;

        loaded += chunk.len() as u64;
        buffer.extend_from_slice(&chunk);
        on_progress(DownloadProgress::new(loaded, total));
    }

    Ok(buffer.freeze())
}

/// Reduces `filename` to a single path component so saves stay inside the
/// output directory.
fn local_file_name(filename: &str) -> String {
    let name = naming::sanitize_filename(filename);
    if name.trim_matches('.').is_empty() {
        "download".to_string()
    } else {
        name
    }
}

fn is_network_failure(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}

pub struct ProxyDownloader {
    http: reqwest::Client,
    server_base: String,
    output_dir: PathBuf,
    opener: Arc<dyn UrlOpener>,
}

impl ProxyDownloader {
    pub fn new(http: reqwest::Client, server_base: &str, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            http,
            server_base: server_base.trim_end_matches('/').to_string(),
            output_dir: output_dir.into(),
            opener: Arc::new(SystemOpener),
        }
    }

    pub fn with_opener(mut self, opener: Arc<dyn UrlOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn proxy_url(&self, remote_url: &str) -> String {
        format!(
            "{}/api/proxy-download?url={}",
            self.server_base,
            urlencoding::encode(remote_url)
        )
    }

    pub async fn download(&self, url: &str, filename: &str) -> Result<DownloadOutcome, DownloadError> {
        self.download_with_progress(url, filename, |_| {}).await
    }

    /// Downloads `url` through the relay and saves it as `filename` in the
    /// output directory.
    ///
    /// When the relay cannot be reached at all the URL is opened directly
    /// instead, since some environments block the proxy but allow plain
    /// navigation. A relay that answers with an error status is reported as
    /// [`DownloadError::Status`].
    pub async fn download_with_progress(
        &self,
        url: &str,
        filename: &str,
        on_progress: impl FnMut(DownloadProgress),
    ) -> Result<DownloadOutcome, DownloadError> {
        info!("Starting download: {filename}");
        let proxy_url = self.proxy_url(url);
        debug!("Proxy URL: {proxy_url}");

        let response = match self.http.get(&proxy_url).send().await {
            Ok(response) => response,
            Err(error) if is_network_failure(&error) => {
                warn!("Proxy unreachable ({error}); opening {url} directly");
                self.opener
                    .open(url)
                    .map_err(|source| DownloadError::Fallback {
                        url: url.to_string(),
                        source,
                    })?;
                return Ok(DownloadOutcome::OpenedExternally {
                    url: url.to_string(),
                });
            }
            Err(error) => return Err(error.into()),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|error| {
                warn!("Could not read proxy error body: {error}");
                "No response".to_string()
            });
            error!("Proxy error: {status}");
            return Err(DownloadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let total = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(0);
        debug!("Content-Length: {total} bytes");

        let payload = collect_with_progress(response.bytes_stream(), total, on_progress).await?;

        let path = self.output_dir.join(local_file_name(filename));
        self.save(&path, &payload).await?;
        info!(
            "Successfully downloaded {filename} ({} bytes)",
            payload.len()
        );

        Ok(DownloadOutcome::Saved {
            path,
            bytes: payload.len() as u64,
        })
    }

    async fn save(&self, path: &Path, payload: &[u8]) -> Result<(), DownloadError> {
        let to_save_error = |source| DownloadError::Save {
            path: path.to_path_buf(),
            source,
        };

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(to_save_error)?;
        tokio::fs::write(path, payload).await.map_err(to_save_error)
    }
}
