//! Ordered admission pipeline.
//!
//! # Responsibilities
//! - Run every admission stage in a fixed order before dispatch
//! - Stop at the first stage that answers or fails
//! - Apply the headers stages recorded onto whatever response goes out
//!
//! # Design Decisions
//! - Stages see only request parts, never the body
//! - Stage annotations never overwrite a header the response already carries
//!   (`Vary` is merged instead)
//! - Annotations are applied to error responses too, so a 429 still carries
//!   CORS and security headers
//! - The request timeout bounds everything downstream of the stages, so a
//!   timed-out request is answered here and still gets its annotations

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::security::{CorsStage, OriginPolicy, RateLimitStage, RateLimiter, SecurityHeadersStage};

/// What a stage decided about the request.
#[derive(Debug)]
pub enum Outcome {
    /// Hand the request to the next stage.
    Continue,
    /// Answer now; later stages and dispatch are skipped.
    Respond(Response),
}

/// Response annotations accumulated while stages run.
#[derive(Debug, Default)]
pub struct StageContext {
    headers: HeaderMap,
    strip: Vec<HeaderName>,
}

impl StageContext {
    /// Record a header for the outgoing response.
    pub fn annotate(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    /// Record a header to remove from the outgoing response.
    pub fn strip(&mut self, name: HeaderName) {
        self.strip.push(name);
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn stripped(&self) -> &[HeaderName] {
        &self.strip
    }

    /// Write the recorded annotations onto `response`.
    pub fn apply(self, response: &mut Response) {
        let target = response.headers_mut();
        for name in &self.strip {
            target.remove(name);
        }

        for name in self.headers.keys() {
            if *name == header::VARY {
                for value in self.headers.get_all(name) {
                    if !vary_contains(target, value) {
                        target.append(header::VARY, value.clone());
                    }
                }
            } else if !target.contains_key(name) {
                for value in self.headers.get_all(name) {
                    target.append(name.clone(), value.clone());
                }
            }
        }
    }
}

fn vary_contains(headers: &HeaderMap, value: &HeaderValue) -> bool {
    let Ok(wanted) = value.to_str() else {
        return false;
    };
    headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|v| v.trim().eq_ignore_ascii_case(wanted) || v.trim() == "*")
}

/// One admission check.
pub trait Stage: Send + Sync {
    /// Label used in logs.
    fn name(&self) -> &'static str;

    fn evaluate(&self, request: &Parts, ctx: &mut StageContext) -> Result<Outcome, GatewayError>;
}

/// Stages in the order they run.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage; stages run in insertion order.
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Bound the time admitted requests may spend downstream.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// CORS, then security headers, then rate limiting (when enabled).
    pub fn from_config(config: &GatewayConfig, limiter: Arc<RateLimiter>) -> Self {
        let policy = OriginPolicy::new(
            config.cors.allowed_origins.iter().cloned(),
            config.mode.is_production(),
        );
        let pipeline = Self::new()
            .with_timeout(Duration::from_secs(config.timeouts.request_secs))
            .with_stage(CorsStage::new(policy))
            .with_stage(SecurityHeadersStage::new());

        if config.rate_limit.enabled {
            pipeline.with_stage(RateLimitStage::new(limiter, &config.rate_limit))
        } else {
            pipeline
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, request: &Parts, ctx: &mut StageContext) -> Result<Outcome, GatewayError> {
        for stage in &self.stages {
            match stage.evaluate(request, ctx) {
                Ok(Outcome::Continue) => {}
                Ok(Outcome::Respond(response)) => {
                    tracing::trace!(stage = stage.name(), status = %response.status(), "Stage answered request");
                    return Ok(Outcome::Respond(response));
                }
                Err(err) => {
                    tracing::trace!(stage = stage.name(), kind = err.kind(), "Stage rejected request");
                    return Err(err);
                }
            }
        }
        Ok(Outcome::Continue)
    }
}

/// Middleware running the pipeline in front of static mounts and dispatch.
pub async fn admission_middleware(
    State(pipeline): State<Arc<Pipeline>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    let (parts, body) = request.into_parts();
    let mut ctx = StageContext::default();
    let verdict = pipeline.run(&parts, &mut ctx);

    let mut response = match verdict {
        Ok(Outcome::Continue) => {
            let path = parts.uri.path().to_owned();
            let downstream = next.run(Request::from_parts(parts, body));
            match pipeline.timeout() {
                Some(after) => match tokio::time::timeout(after, downstream).await {
                    Ok(response) => response,
                    Err(_) => GatewayError::Timeout { path, after }.into_response(),
                },
                None => downstream.await,
            }
        }
        Ok(Outcome::Respond(response)) => response,
        Err(err) => err.into_response(),
    };

    ctx.apply(&mut response);
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}
