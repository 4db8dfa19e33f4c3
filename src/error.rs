use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(rename = "triedEndpoints", skip_serializing_if = "Option::is_none")]
    tried_endpoints: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_seconds: Option<u64>,
}

/// Error returned by every relay route. Always rendered as a JSON body with
/// at least an `error` field.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
    pub code: Option<&'static str>,
    pub tried_endpoints: Option<Vec<String>>,
    pub retry_after_seconds: Option<u64>,
    echo_status: bool,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
            code: None,
            tried_endpoints: None,
            retry_after_seconds: None,
            echo_status: false,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn api_key_missing() -> Self {
        Self {
            code: Some("API_KEY_MISSING"),
            ..Self::internal(
                "API key not configured. Please set RAPIDAPI_KEY in environment variables.",
            )
        }
    }

    pub fn rate_limited(details: Option<String>, retry_after_seconds: Option<u64>) -> Self {
        Self {
            details,
            code: Some("RATE_LIMITED"),
            retry_after_seconds,
            echo_status: true,
            ..Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                "API rate limit exceeded. Please wait a moment and try again, or upgrade your RapidAPI plan.",
            )
        }
    }

    pub fn access_denied(details: Option<String>) -> Self {
        Self {
            details,
            code: Some("ACCESS_DENIED"),
            echo_status: true,
            ..Self::new(
                StatusCode::FORBIDDEN,
                "API access denied. Please check your RapidAPI subscription.",
            )
        }
    }

    /// Passes an upstream status through. Codes `StatusCode` cannot represent
    /// become 502.
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
        Self {
            code: Some("UPSTREAM_FAILED"),
            ..Self::new(status, message)
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_tried_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.tried_endpoints = Some(endpoints);
        self
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            details: self.details,
            status: self.echo_status.then(|| self.status.as_u16()),
            code: self.code,
            tried_endpoints: self.tried_endpoints,
            retry_after_seconds: self.retry_after_seconds,
        });

        let mut response = (self.status, body).into_response();
        if let Some(seconds) = self.retry_after_seconds
            && let Ok(value) = HeaderValue::from_str(&seconds.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }

        response
    }
}
