//! Admission stages.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs        (origin check, pre-flight answer)
//!     → headers.rs     (hardened response headers)
//!     → rate_limit.rs  (per-client window under /api/)
//!     → static mounts / collaborators
//! ```
//!
//! Each stage implements [`crate::http::pipeline::Stage`]. Stages only read
//! the request; anything they want on the response is recorded in the stage
//! context and applied after the downstream response exists.

pub mod cors;
pub mod headers;
pub mod rate_limit;

pub use cors::{CorsStage, OriginPolicy};
pub use headers::{SecurityHeadersStage, SECURITY_HEADERS};
pub use rate_limit::{client_identity, peer_addr, RateDecision, RateLimitStage, RateLimiter};
