//! Same-origin relay for media hosted on the video CDN.
//!
//! One outbound GET per request, no retries and no timeout beyond the HTTP
//! client's defaults. The body is piped through chunk by chunk.

use axum::{
    body::Body,
    http::{
        HeaderMap, HeaderName, HeaderValue,
        header::{
            ACCEPT, ACCEPT_LANGUAGE, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, ORIGIN,
            REFERER, USER_AGENT,
        },
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{Instrument, info, info_span, warn};
use url::Url;
use uuid::Uuid;

use crate::{config::non_empty, error::ApiError, naming};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const YOUTUBE_ORIGIN: &str = "https://www.youtube.com";
const YOUTUBE_REFERER: &str = "https://www.youtube.com/";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Default, Deserialize)]
pub struct ProxyRequest {
    pub url: Option<String>,
    pub filename: Option<String>,
}

/// Headers the CDN expects from a browser playing the video on youtube.com.
pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("empty"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("cors"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("cross-site"),
    );
    headers.insert(REFERER, HeaderValue::from_static(YOUTUBE_REFERER));
    headers.insert(ORIGIN, HeaderValue::from_static(YOUTUBE_ORIGIN));
    headers
}

/// Client for proxied fetches. Redirects keep the browser headers; reqwest
/// would otherwise rewrite `Referer` to the previous hop.
pub fn build_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().referer(false).build()
}

pub fn parse_target(raw: Option<&str>) -> Result<Url, ApiError> {
    let raw = raw
        .and_then(non_empty)
        .ok_or_else(|| ApiError::bad_request("URL parameter is required"))?;

    let url = Url::parse(raw)
        .map_err(|error| ApiError::bad_request(format!("Invalid URL parameter: {error}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::bad_request(
            "Only absolute http(s) URLs can be proxied",
        ));
    }

    Ok(url)
}

fn cors_headers(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

/// Fetches `request.url` and streams it back with pass-through content
/// headers. Upstream failures never forward any body bytes.
pub async fn relay(client: &reqwest::Client, request: ProxyRequest) -> Result<Response, ApiError> {
    let target = parse_target(request.url.as_deref())?;
    let span = info_span!("proxy", request_id = %Uuid::new_v4(), host = target.host_str().unwrap_or_default());

    async move {
        info!("Proxy fetching {target}");

        let upstream = client
            .get(target.clone())
            .headers(browser_headers())
            .send()
            .await
            .map_err(|error| {
                warn!("Proxy transport error: {error}");
                ApiError::internal(format!("Proxy error: {error}"))
            })?;

        let status = upstream.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or_default();
            warn!("Proxy HTTP error: {} {reason}", status.as_u16());
            return Err(ApiError::upstream(
                status.as_u16(),
                format!("HTTP error: {} {reason}", status.as_u16()),
            ));
        }

        let mut headers = HeaderMap::new();
        let content_type = upstream
            .headers()
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        headers.insert(CONTENT_TYPE, content_type);
        if let Some(length) = upstream.headers().get(CONTENT_LENGTH) {
            headers.insert(CONTENT_LENGTH, length.clone());
        }
        cors_headers(&mut headers);

        if let Some(filename) = request.filename.as_deref().and_then(non_empty) {
            let disposition = naming::build_content_disposition(filename);
            if let Ok(value) = HeaderValue::from_str(&disposition) {
                headers.insert(CONTENT_DISPOSITION, value);
            }
            if let Ok(value) = HeaderValue::from_str(&naming::sanitize_ascii_filename(filename)) {
                headers.insert(HeaderName::from_static("x-download-filename"), value);
            }
        }

        info!(
            "Proxy success: {:?}, {}",
            headers.get(CONTENT_TYPE),
            headers
                .get(CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok())
                .map(|length| format!("{length} bytes"))
                .unwrap_or_else(|| "unknown size".to_string())
        );

        let body = Body::from_stream(upstream.bytes_stream());
        Ok((status, headers, body).into_response())
    }
    .instrument(span)
    .await
}
