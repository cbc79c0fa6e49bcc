//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (ordered prefix scan)
//!     → matcher.rs (segment-aware prefix test)
//!     → Return: owning Mount or NoMatch
//!     → collaborator.rs (hand the request over)
//!     → upstream.rs (forward to the upstream service, binary default)
//!
//! Route Compilation (at startup):
//!     RouteConfig[] (registration order)
//!     → Compile matchers
//!     → Bind collaborators
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod collaborator;
pub mod matcher;
pub mod router;
pub mod upstream;

pub use collaborator::{from_fn, Collaborator, CollaboratorFuture, ServiceCollaborator};
pub use matcher::PathPrefixMatcher;
pub use router::{Mount, MountedPrefix, RouteTable};
pub use upstream::{http_client, HttpClient, UpstreamCollaborator};
