//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (window > 0, timeouts > 0, addresses parse)
//! - Check allow-list entries are bare origins
//! - Detect duplicate and shadowed route mounts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::GatewayConfig;
use crate::routing::matcher::PathPrefixMatcher;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener address {0:?} is not a valid socket address")]
    ListenerAddress(String),

    #[error("allowed origin {0:?} is not a bare http(s) origin")]
    InvalidOrigin(String),

    #[error("rate_limit.{0} must be greater than zero")]
    ZeroRateLimit(&'static str),

    #[error("{field} {value:?} must start with '/'")]
    RelativePath { field: &'static str, value: String },

    #[error("route name must not be empty (prefix {0:?})")]
    EmptyRouteName(String),

    #[error("route name {0:?} is used more than once")]
    DuplicateRoute(String),

    #[error("route prefix {0:?} would own every path")]
    RootPrefix(String),

    #[error("route {route:?} is unreachable: shadowed by earlier route {by:?}")]
    ShadowedRoute { route: String, by: String },

    #[error("upstream {0:?} is not a bare http://host[:port] URL")]
    InvalidUpstream(String),

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroTimeout,

    #[error("security.max_body_size must be greater than zero")]
    ZeroBodyLimit,

    #[error("metrics address {0:?} is not a valid socket address")]
    MetricsAddress(String),
}

/// Validate the whole configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address().is_none() {
        errors.push(ValidationError::ListenerAddress(format!(
            "{}:{}",
            config.listener.host, config.listener.port
        )));
    }

    for origin in &config.cors.allowed_origins {
        if !is_bare_origin(origin) {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.max_requests == 0 {
        errors.push(ValidationError::ZeroRateLimit("max_requests"));
    }
    if rate_limit.window_secs == 0 {
        errors.push(ValidationError::ZeroRateLimit("window_secs"));
    }
    if !rate_limit.path_prefix.starts_with('/') {
        errors.push(ValidationError::RelativePath {
            field: "rate_limit.path_prefix",
            value: rate_limit.path_prefix.clone(),
        });
    }

    if !is_http_url(&config.upstream.default_url) {
        errors.push(ValidationError::InvalidUpstream(config.upstream.default_url.clone()));
    }

    validate_routes(config, &mut errors);

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_routes(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let mut names = HashSet::new();
    let mut earlier: Vec<(&str, PathPrefixMatcher)> = Vec::new();

    for route in &config.routes {
        if route.name.is_empty() {
            errors.push(ValidationError::EmptyRouteName(route.prefix.clone()));
        } else if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }

        if !route.prefix.starts_with('/') {
            errors.push(ValidationError::RelativePath {
                field: "routes.prefix",
                value: route.prefix.clone(),
            });
            continue;
        }

        let matcher = PathPrefixMatcher::new(route.prefix.as_str());
        if matcher.prefix().is_empty() {
            errors.push(ValidationError::RootPrefix(route.prefix.clone()));
            continue;
        }

        if let Some((by, _)) = earlier.iter().find(|(_, m)| m.matches(matcher.prefix())) {
            errors.push(ValidationError::ShadowedRoute {
                route: route.name.clone(),
                by: by.to_string(),
            });
        }

        if let Some(upstream) = &route.upstream {
            if !is_http_url(upstream) {
                errors.push(ValidationError::InvalidUpstream(upstream.clone()));
            }
        }

        earlier.push((route.name.as_str(), matcher));
    }
}

/// `Origin` headers carry scheme, host and optional port only, so an
/// allow-list entry with a path or trailing slash could never match.
fn is_bare_origin(origin: &str) -> bool {
    match Url::parse(origin) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some()
                && url.origin().ascii_serialization() == origin
        }
        Err(_) => false,
    }
}

/// Requests are forwarded with their own path, so an upstream base URL
/// carries scheme, host and port only.
fn is_http_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => {
            url.scheme() == "http"
                && url.host_str().is_some()
                && url.path() == "/"
                && url.query().is_none()
                && url.fragment().is_none()
        }
        Err(_) => false,
    }
}
