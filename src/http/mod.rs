//! HTTP front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, layer stack)
//!     → pipeline.rs (admission stages: CORS, security headers, rate limit)
//!     → body_limit.rs (JSON bodies only)
//!     → dispatch.rs
//!         → static_files.rs (/uploads, /certificates, /receipts)
//!         → GET / liveness
//!         → routing::RouteTable (first mount owning the path)
//!     → error fallback (crate::error)
//! ```

pub mod body_limit;
pub mod dispatch;
pub mod pipeline;
pub mod server;
pub mod static_files;

pub use dispatch::{AppState, LIVENESS_MESSAGE};
pub use pipeline::{Outcome, Pipeline, Stage, StageContext};
pub use server::HttpServer;
pub use static_files::{StaticMount, StaticMounts};
