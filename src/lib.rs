pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod media_api;
pub mod naming;
pub mod normalize;
pub mod proxy;
pub mod routes;
pub mod video;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{config::Config, error::ApiError, media_api::MediaApiClient};

/// Shared per-process handles. Nothing in here is mutated by requests.
#[derive(Clone)]
pub struct AppState {
    pub media_api: MediaApiClient,
    pub proxy_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let to_api_error =
            |error: reqwest::Error| ApiError::internal(format!("Could not build HTTP client: {error}"));
        let http_client = reqwest::Client::builder().build().map_err(to_api_error)?;

        Ok(Self {
            media_api: MediaApiClient::new(http_client, config.media_api.clone()),
            proxy_client: proxy::build_client().map_err(to_api_error)?,
        })
    }
}

pub fn build_router(state: AppState, config: &Config) -> Result<Router, ApiError> {
    let cors = config::build_cors_layer(&config.allowed_origins)?;

    Ok(Router::new()
        .route("/api/health", get(routes::health))
        .route(
            "/api/youtube",
            post(routes::video_info_post).get(routes::video_info_get),
        )
        .route(
            "/api/youtube/playlist",
            post(routes::playlist_post).get(routes::playlist_get),
        )
        .route(
            "/api/youtube/related",
            post(routes::related_post).get(routes::related_get),
        )
        .route(
            "/api/proxy-download",
            get(routes::proxy_download_get).post(routes::proxy_download_post),
        )
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}
