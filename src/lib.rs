//! Request-admission gateway for the platform's HTTP API.
//!
//! Every request passes an ordered pipeline (origin check, security headers,
//! per-client rate limit under `/api/`) before it is answered from a static
//! mount, by the liveness route, or by the collaborator owning its path
//! prefix. Any failure past admission becomes a generic 500.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::RouteTable;
