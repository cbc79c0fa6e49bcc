//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! NODE_ENV (runtime mode)
//!     → loader.rs (read config/<mode>.toml, apply environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to the pipeline stages
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal (or missing) settings files
//! - Environment wins over the settings file
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, load_config, load_from_env, ConfigError};
pub use schema::{
    default_routes, CompressionConfig, CorsConfig, GatewayConfig, ListenerConfig,
    ObservabilityConfig, RateLimitConfig, RouteConfig, RuntimeMode, StaticFilesConfig,
    DEFAULT_MOUNTS,
};
pub use validation::{validate_config, ValidationError};
