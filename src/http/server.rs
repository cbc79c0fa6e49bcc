//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the axum router around the terminal dispatcher
//! - Wire up the layer stack (request ID, tracing, admission with its
//!   timeout, panic capture, compression, JSON body limit)
//! - Own the rate limiter and its sweeper task
//! - Serve with graceful shutdown
//!
//! Layer order, outermost first:
//! ```text
//! SetRequestId → Trace → PropagateRequestId
//!     → admission pipeline (CORS → security headers → rate limit, then
//!       the request timeout around everything below)
//!     → CatchPanic → Compression → JSON body limit → dispatch
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{body::Body, http::Request, middleware, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::{
        predicate::{DefaultPredicate, Predicate, SizeAbove},
        CompressionLayer,
    },
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::config::GatewayConfig;
use crate::error::handle_panic;
use crate::http::body_limit::limit_json_bodies;
use crate::http::dispatch::{dispatch, AppState};
use crate::http::pipeline::{admission_middleware, Pipeline};
use crate::http::static_files::StaticMounts;
use crate::routing::{http_client, upstream::UpstreamUrlError, RouteTable};
use crate::security::RateLimiter;

/// The gateway's HTTP front end.
pub struct HttpServer {
    router: Router,
    config: Arc<GatewayConfig>,
    limiter: Arc<RateLimiter>,
}

impl HttpServer {
    /// Build a server whose routes forward to the configured upstreams.
    pub fn new(config: GatewayConfig) -> Result<Self, UpstreamUrlError> {
        let routes = RouteTable::from_config(&config, http_client())?;
        Ok(Self::with_routes(config, routes))
    }

    /// Build a server around an explicit route table.
    pub fn with_routes(config: GatewayConfig, routes: RouteTable) -> Self {
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let pipeline = Arc::new(Pipeline::from_config(&config, limiter.clone()));
        let state = AppState {
            routes: Arc::new(routes),
            statics: Arc::new(StaticMounts::from_root(&config.static_files.root)),
        };

        tracing::debug!(
            stages = ?pipeline.stage_names(),
            mounts = state.routes.len(),
            static_root = %config.static_files.root.display(),
            "Request pipeline assembled"
        );

        let router = Self::build_router(&config, state, pipeline);
        Self {
            router,
            config: Arc::new(config),
            limiter,
        }
    }

    fn build_router(config: &GatewayConfig, state: AppState, pipeline: Arc<Pipeline>) -> Router {
        let mut router = Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(middleware::from_fn_with_state(
                config.security.max_body_size,
                limit_json_bodies,
            ));

        if config.compression.enabled {
            let predicate = DefaultPredicate::new().and(SizeAbove::new(config.compression.min_size));
            router = router.layer(CompressionLayer::new().compress_when(predicate));
        }

        router
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(middleware::from_fn_with_state(pipeline, admission_middleware))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, e.g. for driving with `oneshot` in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mode = %self.config.mode,
            "Server running"
        );

        let sweeper = self
            .config
            .rate_limit
            .enabled
            .then(|| self.limiter.spawn_sweeper(shutdown.resubscribe()));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}
