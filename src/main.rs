//! API gateway binary.
//!
//! ```text
//!     Client ──▶ request id / trace
//!                    │
//!                    ▼
//!          ┌──────────────────────────────┐
//!          │ admission pipeline           │
//!          │  CORS → headers → rate limit │
//!          │  then timeout on dispatch    │
//!          └──────────────┬───────────────┘
//!                         ▼
//!          static mounts ─▶ GET / ─▶ route table ──▶ collaborator services
//!                         │
//!                         ▼
//!                  error fallback (500)
//! ```
//!
//! Configuration comes from `config/<NODE_ENV>.toml` (or `GATEWAY_CONFIG`)
//! overlaid with `CLIENT_URL`, `PORT`, `HOST` and `UPLOAD_ROOT`.

use api_gateway::{config, lifecycle, observability::logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_from_env()?;
    logging::init(&config.observability, &config.mode)?;

    match &config.settings_file {
        Some(path) => tracing::info!(path = %path.display(), "Settings file loaded"),
        None => tracing::debug!("No settings file, using defaults"),
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %config.mode,
        port = config.listener.port,
        allowed_origins = ?config.cors.allowed_origins,
        rate_limit = config.rate_limit.max_requests,
        rate_window_secs = config.rate_limit.window_secs,
        "Configuration loaded"
    );

    lifecycle::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
