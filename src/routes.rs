use axum::{
    Json,
    body::Bytes,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    normalize,
    proxy::{self, ProxyRequest},
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequest {
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistRequest {
    playlist_id: Option<String>,
}

fn from_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(format!("Invalid JSON body: {rejection}")))
}

fn from_query<T>(payload: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    payload
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError::bad_request(format!("Invalid query string: {rejection}")))
}

fn required_video_id(request: VideoRequest) -> Result<String, ApiError> {
    let raw = request
        .video_id
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Video ID is required"))?;

    normalize::resolve_video_id(&raw).ok_or_else(|| {
        ApiError::bad_request(format!(
            "Invalid video ID {raw:?}: expected 11 characters from [A-Za-z0-9_-] or a YouTube URL"
        ))
    })
}

fn required_playlist_id(request: PlaylistRequest) -> Result<String, ApiError> {
    let raw = request
        .playlist_id
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Playlist ID is required"))?;

    normalize::resolve_playlist_id(&raw)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid playlist ID {raw:?}")))
}

pub async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn video_info_post(
    State(state): State<AppState>,
    payload: Result<Json<VideoRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    video_info(state, from_json(payload)?).await
}

pub async fn video_info_get(
    State(state): State<AppState>,
    payload: Result<Query<VideoRequest>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    video_info(state, from_query(payload)?).await
}

async fn video_info(state: AppState, request: VideoRequest) -> Result<Json<Value>, ApiError> {
    let video_id = required_video_id(request)?;
    let span = info_span!("video_lookup", request_id = %Uuid::new_v4(), video_id = %video_id);

    async move {
        info!("Fetching video info");
        let fetched = state.media_api.fetch_video(&video_id).await?;
        Ok::<_, ApiError>(Json(fetched.into_annotated()))
    }
    .instrument(span)
    .await
}

pub async fn playlist_post(
    State(state): State<AppState>,
    payload: Result<Json<PlaylistRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    playlist(state, from_json(payload)?).await
}

pub async fn playlist_get(
    State(state): State<AppState>,
    payload: Result<Query<PlaylistRequest>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    playlist(state, from_query(payload)?).await
}

async fn playlist(state: AppState, request: PlaylistRequest) -> Result<Json<Value>, ApiError> {
    let playlist_id = required_playlist_id(request)?;
    info!("Fetching playlist info for {playlist_id}");
    let data = state.media_api.fetch_playlist(&playlist_id).await?;
    Ok(Json(data))
}

pub async fn related_post(
    State(state): State<AppState>,
    payload: Result<Json<VideoRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    related(state, from_json(payload)?).await
}

pub async fn related_get(
    State(state): State<AppState>,
    payload: Result<Query<VideoRequest>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    related(state, from_query(payload)?).await
}

async fn related(state: AppState, request: VideoRequest) -> Result<Json<Value>, ApiError> {
    let video_id = required_video_id(request)?;
    info!("Fetching related videos for {video_id}");
    let data = state.media_api.fetch_related(&video_id).await?;
    Ok(Json(data))
}

pub async fn proxy_download_get(
    State(state): State<AppState>,
    payload: Result<Query<ProxyRequest>, QueryRejection>,
) -> Result<Response, ApiError> {
    proxy::relay(&state.proxy_client, from_query(payload)?).await
}

/// Accepts the target in the query string or as a JSON body `{ "url": ... }`.
pub async fn proxy_download_post(
    State(state): State<AppState>,
    query: Result<Query<ProxyRequest>, QueryRejection>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut request = from_query(query)?;
    if request.url.is_none() && !body.is_empty() {
        let from_body: ProxyRequest = serde_json::from_slice(&body)
            .map_err(|error| ApiError::bad_request(format!("Invalid JSON body: {error}")))?;
        request.url = from_body.url;
        request.filename = request.filename.or(from_body.filename);
    }

    proxy::relay(&state.proxy_client, request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_id_accepts_bare_ids_and_urls() {
        let request = |value: &str| VideoRequest {
            video_id: Some(value.to_string()),
        };

        assert_eq!(
            required_video_id(request("dQw4w9WgXcQ")).expect("bare id"),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            required_video_id(request("https://youtu.be/dQw4w9WgXcQ")).expect("url"),
            "dQw4w9WgXcQ"
        );
        assert!(required_video_id(request("nope")).is_err());
        assert_eq!(
            required_video_id(VideoRequest::default())
                .expect_err("missing")
                .message,
            "Video ID is required"
        );
    }

    #[test]
    fn playlist_id_is_required() {
        let error = required_playlist_id(PlaylistRequest::default()).expect_err("missing");
        assert_eq!(error.message, "Playlist ID is required");
        assert_eq!(
            required_playlist_id(PlaylistRequest {
                playlist_id: Some("PLrAXtmRdnEQy4qtr".to_string())
            })
            .expect("valid"),
            "PLrAXtmRdnEQy4qtr"
        );
    }
}
