//! Origin validation (CORS).
//!
//! Outside production, or for requests without an `Origin` header, every
//! request is admitted. In production an origin must be in the allow-list or
//! the request fails before anything downstream sees it.

use std::collections::HashSet;

use axum::{
    body::Body,
    http::{
        header::{self, HeaderValue},
        request::Parts,
        Method, StatusCode,
    },
    response::Response,
};

use crate::error::GatewayError;
use crate::http::pipeline::{Outcome, Stage, StageContext};

/// Methods advertised on pre-flight responses.
pub const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Request headers advertised on pre-flight responses.
pub const ALLOWED_HEADERS: [&str; 2] = ["Content-Type", "Authorization"];

/// Immutable admit/reject decision for request origins.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allow_list: HashSet<String>,
    production: bool,
}

impl OriginPolicy {
    pub fn new<I, S>(allowed_origins: I, production: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow_list: allowed_origins.into_iter().map(Into::into).collect(),
            production,
        }
    }

    /// Admit when the origin is absent, when not in production, or when the
    /// origin is allow-listed.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(_) if !self.production => true,
            Some(origin) => self.allow_list.contains(origin),
        }
    }
}

/// Pipeline stage enforcing [`OriginPolicy`] and answering pre-flights.
#[derive(Debug, Clone)]
pub struct CorsStage {
    policy: OriginPolicy,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
}

impl CorsStage {
    pub fn new(policy: OriginPolicy) -> Self {
        Self {
            policy,
            allow_methods: join_header(ALLOWED_METHODS.iter().map(Method::as_str)),
            allow_headers: join_header(ALLOWED_HEADERS),
        }
    }
}

fn join_header<'a>(items: impl IntoIterator<Item = &'a str>) -> HeaderValue {
    let joined = items.into_iter().collect::<Vec<_>>().join(",");
    HeaderValue::from_str(&joined).unwrap_or_else(|_| HeaderValue::from_static(""))
}

impl Stage for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn evaluate(&self, request: &Parts, ctx: &mut StageContext) -> Result<Outcome, GatewayError> {
        let origin_header = request.headers.get(header::ORIGIN);
        let origin = origin_header.map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

        if !self.policy.allows(origin.as_deref()) {
            return Err(GatewayError::OriginRejected {
                origin: origin.unwrap_or_default(),
            });
        }

        if let Some(value) = origin_header {
            ctx.annotate(header::ACCESS_CONTROL_ALLOW_ORIGIN, value.clone());
        }
        ctx.annotate(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        ctx.annotate(header::VARY, HeaderValue::from_static("Origin"));

        if request.method == Method::OPTIONS {
            ctx.annotate(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
            ctx.annotate(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());

            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::NO_CONTENT;
            response
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
            return Ok(Outcome::Respond(response));
        }

        Ok(Outcome::Continue)
    }
}
