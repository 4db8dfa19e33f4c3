use std::{collections::HashSet, sync::Arc};

use axum::http::{HeaderName, HeaderValue, Method, header::CONTENT_DISPOSITION};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ApiError;

pub const DEFAULT_MEDIA_API_BASE: &str = "https://youtube-media-downloader.p.rapidapi.com";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3002";

/// Relay configuration. Built once at startup and handed to the components
/// that need it.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub media_api: MediaApiConfig,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MediaApiConfig {
    pub base_url: Url,
    /// Sent as `x-rapidapi-host`.
    pub host: String,
    /// Missing keys are reported per request, not at boot.
    pub api_key: Option<String>,
}

impl MediaApiConfig {
    pub fn new(base_url: Url, api_key: Option<String>) -> Self {
        let host = base_url
            .host_str()
            .map(ToString::to_string)
            .unwrap_or_default();
        Self {
            base_url,
            host,
            api_key,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ApiError> {
        let api_key = read_string_env("RAPIDAPI_KEY");
        let base = read_string_env("MEDIA_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_MEDIA_API_BASE.to_string());
        let base_url = Url::parse(&base).map_err(|error| {
            ApiError::internal(format!("Invalid MEDIA_API_BASE_URL {base:?}: {error}"))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::internal(format!(
                "MEDIA_API_BASE_URL must be an http(s) URL, got {base:?}"
            )));
        }

        let allowed_origins = read_string_env("ALLOWED_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr: resolve_bind_addr(),
            media_api: MediaApiConfig::new(base_url, api_key),
            allowed_origins,
        })
    }
}

fn read_string_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .and_then(|value| non_empty(&value).map(ToString::to_string))
}

fn resolve_bind_addr() -> String {
    if let Some(configured) = read_string_env("APP_ADDR") {
        return configured;
    }

    if let Some(port) = std::env::var("PORT")
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
    {
        return format!("0.0.0.0:{port}");
    }

    DEFAULT_BIND_ADDR.to_string()
}

/// Permissive when no allow-list is configured, matching what browsers need
/// to reach the proxy from any page.
pub fn build_cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, ApiError> {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([
            CONTENT_DISPOSITION,
            HeaderName::from_static("x-download-filename"),
        ]);

    if allowed_origins.is_empty() {
        warn!("ALLOWED_ORIGINS not configured; accepting requests from any origin.");
        return Ok(base.allow_origin(Any));
    }

    let normalized_origins = allowed_origins
        .iter()
        .map(|origin| {
            normalize_origin(origin).ok_or_else(|| {
                ApiError::internal(format!(
                    "Invalid origin in ALLOWED_ORIGINS: {origin}. Use values like https://example.com"
                ))
            })
        })
        .collect::<Result<HashSet<_>, _>>()?;
    let allowed = Arc::new(normalized_origins);
    info!("CORS allow-list loaded with {} origin(s)", allowed.len());

    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let normalized = origin.to_str().ok().and_then(normalize_origin);
        let permitted = normalized
            .as_ref()
            .is_some_and(|value| allowed.contains(value));
        debug!("CORS origin check raw={origin:?} allowed={permitted}");
        permitted
    });

    Ok(base.allow_origin(allow_origin))
}

fn normalize_origin(value: &str) -> Option<String> {
    let parsed = Url::parse(value).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let scheme = parsed.scheme();
    let default_port = match scheme {
        "http" => 80,
        "https" => 443,
        _ => return None,
    };

    if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() {
        return None;
    }

    match parsed.port() {
        Some(port) if port != default_port => Some(format!("{scheme}://{host}:{port}")),
        _ => Some(format!("{scheme}://{host}")),
    }
}

pub(crate) fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
