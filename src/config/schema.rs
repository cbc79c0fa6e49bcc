//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from the mode-specific
//! settings file; environment overrides are applied afterwards by the loader.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Runtime mode (`NODE_ENV`). Not read from the settings file.
    #[serde(skip)]
    pub mode: RuntimeMode,

    /// Settings file the configuration was read from, if any.
    #[serde(skip)]
    pub settings_file: Option<PathBuf>,

    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Response compression.
    pub compression: CompressionConfig,

    /// Public static directories.
    pub static_files: StaticFilesConfig,

    /// Where collaborators without an explicit upstream are reached.
    pub upstream: UpstreamConfig,

    /// Prefix mounts, in registration order.
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::default(),
            settings_file: None,
            listener: ListenerConfig::default(),
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            compression: CompressionConfig::default(),
            static_files: StaticFilesConfig::default(),
            upstream: UpstreamConfig::default(),
            routes: default_routes(),
            timeouts: TimeoutConfig::default(),
            security: SecurityConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Configuration with the given runtime mode and defaults everywhere else.
    pub fn for_mode(mode: impl Into<String>) -> Self {
        Self {
            mode: RuntimeMode::new(mode),
            ..Self::default()
        }
    }
}

/// Named runtime mode. Only the exact name `production` enables production
/// behaviour; every other name (including unknown ones) is non-production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeMode(String);

impl RuntimeMode {
    pub const PRODUCTION: &'static str = "production";
    pub const DEVELOPMENT: &'static str = "development";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn production() -> Self {
        Self::new(Self::PRODUCTION)
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_production(&self) -> bool {
        self.0 == Self::PRODUCTION
    }
}

impl Default for RuntimeMode {
    fn default() -> Self {
        Self::new(Self::DEVELOPMENT)
    }
}

impl std::fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind host (e.g., "0.0.0.0").
    pub host: String,

    /// Bind port.
    pub port: u16,
}

impl ListenerConfig {
    /// Socket address to bind, if host and port form a valid one.
    pub fn bind_address(&self) -> Option<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().ok()
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5050,
        }
    }
}

/// Cross-origin policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to make credentialed requests in production.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests admitted per client within one window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Only requests under this prefix are counted.
    pub path_prefix: String,

    /// Identify clients by the first `X-Forwarded-For` entry instead of the
    /// peer address. Only enable behind a trusted proxy.
    pub trust_forwarded_for: bool,

    /// Also send the `X-RateLimit-*` header set alongside `RateLimit-*`.
    pub legacy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_secs: 15 * 60,
            path_prefix: "/api/".to_string(),
            trust_forwarded_for: false,
            legacy_headers: true,
        }
    }
}

/// Response compression configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,

    /// Bodies at or below this many bytes are sent as-is.
    pub min_size: u16,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_size: 1024,
        }
    }
}

/// Static directory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Upload storage root. `/uploads` serves it directly, `/certificates`
    /// and `/receipts` serve its subdirectories of the same name.
    pub root: PathBuf,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("uploads"),
        }
    }
}

/// Upstream defaults for collaborators.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL used by routes that do not name their own upstream.
    pub default_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            default_url: "http://127.0.0.1:5051".to_string(),
        }
    }
}

/// A single prefix mount.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// Collaborator name for logging/metrics.
    pub name: String,

    /// Path prefix owned by the collaborator.
    pub prefix: String,

    /// Upstream base URL; falls back to `upstream.default_url`.
    #[serde(default)]
    pub upstream: Option<String>,
}

impl RouteConfig {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            upstream: None,
        }
    }
}

/// Collaborator mounts in registration order. `/api/users/search` precedes
/// `/api/users` so the longer prefix stays reachable.
pub const DEFAULT_MOUNTS: [(&str, &str); 11] = [
    ("auth", "/api/auth"),
    ("purchase", "/api/purchase"),
    ("admin", "/api/admin"),
    ("company-value", "/api/company-value"),
    ("blogs", "/api/blogs"),
    ("payment", "/api/payment"),
    ("documents", "/api/documents"),
    ("transfers", "/api/transfers"),
    ("user-search", "/api/users/search"),
    ("users", "/api/users"),
    ("analytics", "/api/analytics"),
];

/// Default route list built from [`DEFAULT_MOUNTS`].
pub fn default_routes() -> Vec<RouteConfig> {
    DEFAULT_MOUNTS
        .iter()
        .map(|(name, prefix)| RouteConfig::new(*name, *prefix))
        .collect()
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum JSON request body size in bytes. Other media types are not capped.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    pub log_level: String,

    /// Force JSON logs. Production always logs JSON.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
