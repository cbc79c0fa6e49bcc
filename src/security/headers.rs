//! Security response headers.
//!
//! Every response passing this stage carries the hardened header set below
//! and loses `X-Powered-By`. A header a downstream responder already set is
//! left alone. This stage never rejects.

use axum::http::{
    header::{HeaderName, HeaderValue},
    request::Parts,
};

use crate::error::GatewayError;
use crate::http::pipeline::{Outcome, Stage, StageContext};

/// Hardened response headers, applied to every response.
pub const SECURITY_HEADERS: [(&str, &str); 12] = [
    (
        "content-security-policy",
        "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
         form-action 'self';frame-ancestors 'self';img-src 'self' data:;\
         object-src 'none';script-src 'self';script-src-attr 'none';\
         style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

/// Pipeline stage annotating responses with [`SECURITY_HEADERS`].
#[derive(Debug, Clone)]
pub struct SecurityHeadersStage {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeadersStage {
    pub fn new() -> Self {
        let headers = SECURITY_HEADERS
            .iter()
            .map(|&(name, value)| (HeaderName::from_static(name), HeaderValue::from_static(value)))
            .collect();
        Self { headers }
    }
}

impl Default for SecurityHeadersStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for SecurityHeadersStage {
    fn name(&self) -> &'static str {
        "security_headers"
    }

    fn evaluate(&self, _request: &Parts, ctx: &mut StageContext) -> Result<Outcome, GatewayError> {
        for (name, value) in &self.headers {
            ctx.annotate(name.clone(), value.clone());
        }
        ctx.strip(X_POWERED_BY);
        Ok(Outcome::Continue)
    }
}
