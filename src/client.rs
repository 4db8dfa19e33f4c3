use std::{path::PathBuf, sync::Arc};

use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    download::{DownloadError, DownloadOutcome, DownloadProgress, ProxyDownloader, UrlOpener},
    video::VideoInfo,
};

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:3002";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Unexpected video payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Download(#[from] DownloadError),
}

/// A resolved video plus the raw payload and the upstream endpoint that
/// answered.
#[derive(Debug, Clone)]
pub struct ResolvedVideo {
    pub info: VideoInfo,
    pub endpoint: Option<String>,
    pub payload: Value,
}

/// Talks to a running relay: metadata lookups and proxied downloads.
pub struct RelayClient {
    http: reqwest::Client,
    server_base: String,
    downloader: ProxyDownloader,
}

impl RelayClient {
    pub fn new(server_base: &str, output_dir: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().build()?;
        let server_base = server_base.trim_end_matches('/').to_string();
        let downloader = ProxyDownloader::new(http.clone(), &server_base, output_dir);

        Ok(Self {
            http,
            server_base,
            downloader,
        })
    }

    /// Reads `TUBEGRAB_SERVER` and `TUBEGRAB_OUTPUT_DIR`.
    pub fn from_env() -> Result<Self, ClientError> {
        let server = std::env::var("TUBEGRAB_SERVER")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());
        let output_dir = std::env::var("TUBEGRAB_OUTPUT_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| ".".to_string());

        Self::new(&server, output_dir)
    }

    pub fn with_opener(mut self, opener: Arc<dyn UrlOpener>) -> Self {
        self.downloader = self.downloader.with_opener(opener);
        self
    }

    pub async fn lookup_video(&self, video_id: &str) -> Result<ResolvedVideo, ClientError> {
        info!("Looking up video {video_id}");
        let payload = self
            .post_json("/api/youtube", json!({ "videoId": video_id }))
            .await?;

        let endpoint = payload
            .pointer("/_metadata/endpoint")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        debug!("Video resolved via {endpoint:?}");

        Ok(ResolvedVideo {
            info: VideoInfo::from_payload(&payload)?,
            endpoint,
            payload,
        })
    }

    pub async fn lookup_playlist(&self, playlist_id: &str) -> Result<Value, ClientError> {
        info!("Looking up playlist {playlist_id}");
        self.post_json("/api/youtube/playlist", json!({ "playlistId": playlist_id }))
            .await
    }

    pub async fn lookup_related(&self, video_id: &str) -> Result<Value, ClientError> {
        self.post_json("/api/youtube/related", json!({ "videoId": video_id }))
            .await
    }

    /// Downloads `url` through this relay into the configured output
    /// directory.
    pub async fn download_file(
        &self,
        url: &str,
        filename: &str,
        on_progress: impl FnMut(DownloadProgress),
    ) -> Result<DownloadOutcome, ClientError> {
        Ok(self
            .downloader
            .download_with_progress(url, filename, on_progress)
            .await?)
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        let response = self
            .http
            .post(format!("{}{path}", self.server_base))
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let success = response.status().is_success();
        let text = response.text().await?;
        let payload: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if !success || payload.get("error").is_some() {
            return Err(ClientError::Api {
                status,
                message: error_message(status, &payload),
            });
        }

        Ok(payload)
    }
}

/// Human-readable message for a relay error body.
pub fn error_message(status: u16, payload: &Value) -> String {
    let reported = payload
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|value| u16::try_from(value).ok())
        .unwrap_or(status);

    match reported {
        429 => "Free request quota exceeded. Wait a few minutes or upgrade the RapidAPI plan."
            .to_string(),
        403 => "API access denied. Check the RapidAPI subscription.".to_string(),
        _ => {
            let error = payload
                .get("error")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .or_else(|| payload.as_str().map(ToString::to_string))
                .unwrap_or_else(|| format!("Could not fetch video information ({status})"));

            match payload.get("details").and_then(Value::as_str) {
                Some(details) if !details.is_empty() => format!("{error} - {details}"),
                _ => error,
            }
        }
    }
}
