//! Request body size limit for JSON payloads.
//!
//! Only `application/json` (and `+json`) bodies are capped. Multipart uploads
//! and other media types stream to collaborators unbounded.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tower_http::body::Limited;
use tower::{service_fn, ServiceExt};
use tower_http::limit::RequestBodyLimit;

/// Whether the request declares a JSON body.
pub fn is_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    let essence = essence.to_ascii_lowercase();
    essence == "application/json" || (essence.len() > "+json".len() && essence.ends_with("+json"))
}

/// Middleware applying [`RequestBodyLimit`] to JSON requests only.
///
/// A declared `Content-Length` over the limit is answered with 413 before the
/// body is read; a streamed body fails once it crosses the limit.
pub async fn limit_json_bodies(State(max_bytes): State<usize>, request: Request, next: Next) -> Response {
    if !is_json(request.headers()) {
        return next.run(request).await;
    }

    let inner = service_fn(move |request: Request<Limited<Body>>| {
        let next = next.clone();
        async move { Ok::<_, Infallible>(next.run(request.map(Body::new)).await) }
    });
    match RequestBodyLimit::new(inner, max_bytes).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}
