//! Startup orchestration.
//!
//! Subsystems come up in dependency order and any failure is fatal: the
//! listener is bound only after the route table is built, so no traffic is
//! accepted by a half-configured gateway.

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::routing::upstream::UpstreamUrlError;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid listener address {host}:{port}")]
    ListenerAddress { host: String, port: u16 },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("invalid upstream: {0}")]
    Upstream(#[from] UpstreamUrlError),

    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

/// Start the gateway and serve until SIGINT/SIGTERM.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let address = config
        .listener
        .bind_address()
        .ok_or_else(|| StartupError::ListenerAddress {
            host: config.listener.host.clone(),
            port: config.listener.port,
        })?;

    let server = HttpServer::new(config)?;
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::shutdown_signal().await;
        shutdown.trigger();
    });

    server
        .run(listener, server_shutdown)
        .await
        .map_err(StartupError::Serve)
}
