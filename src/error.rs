//! Gateway error kinds and the terminal error fallback.
//!
//! Every failure that is not already an HTTP response ends up here. Client
//! facing kinds (rejected origin, exhausted quota, no route) keep a status
//! that identifies them; anything internal is logged in full and answered
//! with a fixed, detail-free 500 body.

use std::any::Any;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::observability::metrics;

/// Boxed error returned by collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body of every internal-fault response.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Body of a rate-limit rejection.
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later.";

/// Failures raised while admitting or dispatching a request.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Origin not in the allow-list while running in production.
    #[error("origin {origin:?} is not allowed")]
    OriginRejected { origin: String },

    /// Per-client quota exhausted for the current window.
    #[error("rate limit exceeded for {client}")]
    RateLimitExceeded { client: String, retry_after: Duration },

    /// A mounted collaborator failed to produce a response.
    #[error("collaborator {collaborator} failed: {source}")]
    Upstream {
        collaborator: String,
        #[source]
        source: BoxError,
    },

    /// Dispatch did not finish within the request timeout.
    #[error("request to {path} timed out after {after:?}")]
    Timeout { path: String, after: Duration },

    /// No static asset, mount or liveness route matched.
    #[error("no route for {path}")]
    NotFound { path: String },

    /// Any other failure inside the gateway itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::OriginRejected { .. } => "origin_rejected",
            GatewayError::RateLimitExceeded { .. } => "rate_limited",
            GatewayError::Upstream { .. } => "upstream",
            GatewayError::Timeout { .. } => "timeout",
            GatewayError::NotFound { .. } => "not_found",
            GatewayError::Internal(_) => "internal",
        }
    }

    pub fn upstream(collaborator: impl Into<String>, source: impl Into<BoxError>) -> Self {
        GatewayError::Upstream {
            collaborator: collaborator.into(),
            source: source.into(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        metrics::record_rejection(self.kind());

        match self {
            GatewayError::OriginRejected { origin } => {
                tracing::warn!(origin = %origin, "Blocked by CORS");
                (
                    StatusCode::FORBIDDEN,
                    Json(json!({ "error": "Not allowed by CORS" })),
                )
                    .into_response()
            }
            GatewayError::RateLimitExceeded { client, retry_after } => {
                tracing::warn!(client = %client, retry_after_secs = retry_after.as_secs(), "Rate limit exceeded");
                let mut response = (StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE).into_response();
                response.headers_mut().insert(
                    header::RETRY_AFTER,
                    HeaderValue::from(retry_after.as_secs().max(1)),
                );
                response
            }
            GatewayError::NotFound { path } => {
                tracing::debug!(path = %path, "No route matched");
                (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
            }
            GatewayError::Upstream { collaborator, source } => {
                tracing::error!(collaborator = %collaborator, error = %source, "Collaborator failed");
                internal_error_response()
            }
            GatewayError::Timeout { path, after } => {
                tracing::error!(path = %path, timeout_secs = after.as_secs(), "Request timed out");
                internal_error_response()
            }
            GatewayError::Internal(message) => {
                tracing::error!(error = %message, "Internal error");
                internal_error_response()
            }
        }
    }
}

/// The generic fault response: HTTP 500, `{"error":"Internal server error"}`.
pub fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": INTERNAL_ERROR_MESSAGE })),
    )
        .into_response()
}

/// Panic handler for the catch-panic layer.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %detail, "Request handler panicked");
    metrics::record_rejection("panic");
    internal_error_response()
}
