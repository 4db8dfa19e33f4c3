//! Client for the third-party media-info API.
//!
//! Video lookups walk three endpoint variants of the same provider and stop
//! at the first 2xx. Playlist and related-video lookups hit one endpoint.

use axum::http::header::RETRY_AFTER;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{config::MediaApiConfig, error::ApiError};

const VIDEO_ENDPOINTS: [&str; 3] = ["v2/video/details", "v2/video/download", "v2/video/info"];
const PLAYLIST_ENDPOINT: &str = "v2/playlist/details";
const RELATED_ENDPOINT: &str = "v2/video/related";

/// Which lookup a failure belongs to; picks the generic failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Video,
    Playlist,
    Related,
}

impl Lookup {
    fn failure_message(self) -> &'static str {
        match self {
            Lookup::Video => "Failed to fetch video information from all endpoints",
            Lookup::Playlist => "Failed to fetch playlist information",
            Lookup::Related => "Failed to fetch related videos",
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("upstream rate limit exceeded")]
    RateLimited {
        body: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("upstream access denied")]
    AccessDenied { body: String },

    #[error("upstream responded with status {status}")]
    Upstream {
        lookup: Lookup,
        status: u16,
        body: String,
        tried_endpoints: Vec<String>,
    },

    #[error("transport error: {message}")]
    Transport {
        message: String,
        tried_endpoints: Vec<String>,
    },

    #[error("invalid upstream payload: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn status(&self) -> u16 {
        match self {
            FetchError::RateLimited { .. } => 429,
            FetchError::AccessDenied { .. } => 403,
            FetchError::Upstream { status, .. } => *status,
            FetchError::MissingApiKey | FetchError::Transport { .. } | FetchError::Decode(_) => {
                500
            }
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::MissingApiKey => ApiError::api_key_missing(),
            FetchError::RateLimited {
                body,
                retry_after_seconds,
            } => ApiError::rate_limited(Some(body), retry_after_seconds),
            FetchError::AccessDenied { body } => ApiError::access_denied(Some(body)),
            FetchError::Upstream {
                lookup,
                status,
                body,
                tried_endpoints,
            } => {
                let error = ApiError::upstream(status, lookup.failure_message()).with_details(body);
                if lookup == Lookup::Video {
                    error.with_tried_endpoints(tried_endpoints)
                } else {
                    error
                }
            }
            FetchError::Transport {
                message,
                tried_endpoints,
            } => ApiError::internal("Internal server error")
                .with_details(message)
                .with_tried_endpoints(tried_endpoints),
            FetchError::Decode(message) => {
                ApiError::internal("Internal server error").with_details(message)
            }
        }
    }
}

/// A successful video lookup and the endpoint that produced it.
#[derive(Debug, Clone)]
pub struct FetchedVideo {
    pub payload: Value,
    pub endpoint: String,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedVideo {
    /// The upstream payload with a `_metadata` object describing the
    /// endpoint and time of the lookup.
    pub fn into_annotated(self) -> Value {
        let metadata = json!({
            "endpoint": self.endpoint,
            "timestamp": self.fetched_at.to_rfc3339(),
        });

        match self.payload {
            Value::Object(mut map) => {
                map.insert("_metadata".to_string(), metadata);
                Value::Object(map)
            }
            other => json!({ "data": other, "_metadata": metadata }),
        }
    }
}

struct FailedAttempt {
    status: u16,
    body: String,
    retry_after_seconds: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct MediaApiClient {
    http: reqwest::Client,
    config: MediaApiConfig,
}

impl MediaApiClient {
    pub fn new(http: reqwest::Client, config: MediaApiConfig) -> Self {
        Self { http, config }
    }

    fn api_key(&self) -> Result<&str, FetchError> {
        self.config.api_key.as_deref().ok_or_else(|| {
            warn!("RAPIDAPI_KEY not configured");
            FetchError::MissingApiKey
        })
    }

    fn endpoint(&self, path: &str, param: &str, value: &str) -> Url {
        let mut url = self.config.base_url.clone();
        // Config only admits http(s) bases, which always have path segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(path.split('/'));
        }
        url.query_pairs_mut().clear().append_pair(param, value);
        url
    }

    /// The ordered endpoint list for a video lookup.
    pub fn video_endpoints(&self, video_id: &str) -> Vec<Url> {
        VIDEO_ENDPOINTS
            .iter()
            .map(|path| self.endpoint(path, "videoId", video_id))
            .collect()
    }

    async fn get(&self, url: &Url, api_key: &str) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .get(url.clone())
            .header("x-rapidapi-key", api_key)
            .header("x-rapidapi-host", &self.config.host)
            .send()
            .await
    }

    pub async fn fetch_video(&self, video_id: &str) -> Result<FetchedVideo, FetchError> {
        let api_key = self.api_key()?;
        let endpoints = self.video_endpoints(video_id);
        let tried_endpoints: Vec<String> = endpoints.iter().map(ToString::to_string).collect();

        let mut last_failure: Option<FailedAttempt> = None;
        let mut last_transport_error: Option<String> = None;

        for endpoint in &endpoints {
            info!("Trying endpoint {endpoint}");
            let response = match self.get(endpoint, api_key).await {
                Ok(response) => response,
                Err(error) => {
                    warn!("Error calling endpoint {endpoint}: {error}");
                    last_transport_error = Some(error.to_string());
                    continue;
                }
            };

            if response.status().is_success() {
                info!("Success with endpoint {endpoint}");
                let payload = response
                    .json::<Value>()
                    .await
                    .map_err(|error| FetchError::Decode(error.to_string()))?;
                return Ok(FetchedVideo {
                    payload,
                    endpoint: endpoint.to_string(),
                    fetched_at: Utc::now(),
                });
            }

            warn!(
                "Endpoint {endpoint} failed with status {}",
                response.status()
            );
            last_failure = Some(read_failure(response).await);
        }

        match last_failure {
            Some(failure) => {
                warn!(
                    "All endpoints failed for video {video_id}; last status {}",
                    failure.status
                );
                Err(classify_failure(Lookup::Video, failure, tried_endpoints))
            }
            None => Err(FetchError::Transport {
                message: last_transport_error.unwrap_or_else(|| "No response".to_string()),
                tried_endpoints,
            }),
        }
    }

    pub async fn fetch_playlist(&self, playlist_id: &str) -> Result<Value, FetchError> {
        let url = self.endpoint(PLAYLIST_ENDPOINT, "playlistId", playlist_id);
        self.fetch_single(Lookup::Playlist, url).await
    }

    pub async fn fetch_related(&self, video_id: &str) -> Result<Value, FetchError> {
        let url = self.endpoint(RELATED_ENDPOINT, "videoId", video_id);
        self.fetch_single(Lookup::Related, url).await
    }

    async fn fetch_single(&self, lookup: Lookup, url: Url) -> Result<Value, FetchError> {
        let api_key = self.api_key()?;
        let response = self
            .get(&url, api_key)
            .await
            .map_err(|error| FetchError::Transport {
                message: error.to_string(),
                tried_endpoints: vec![url.to_string()],
            })?;

        if !response.status().is_success() {
            let failure = read_failure(response).await;
            warn!("{lookup:?} lookup failed with status {}: {}", failure.status, failure.body);
            return Err(classify_failure(lookup, failure, vec![url.to_string()]));
        }

        response
            .json::<Value>()
            .await
            .map_err(|error| FetchError::Decode(error.to_string()))
    }
}

async fn read_failure(response: reqwest::Response) -> FailedAttempt {
    let status = response.status().as_u16();
    let retry_after_seconds = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "No response".to_string());

    FailedAttempt {
        status,
        body,
        retry_after_seconds,
    }
}

fn classify_failure(
    lookup: Lookup,
    failure: FailedAttempt,
    tried_endpoints: Vec<String>,
) -> FetchError {
    match failure.status {
        429 => FetchError::RateLimited {
            body: failure.body,
            retry_after_seconds: failure.retry_after_seconds,
        },
        403 => FetchError::AccessDenied { body: failure.body },
        status => FetchError::Upstream {
            lookup,
            status,
            body: failure.body,
            tried_endpoints,
        },
    }
}
