//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline stages, dispatcher, error fallback produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty in development, JSON in production)
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the HTTP trace span
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
