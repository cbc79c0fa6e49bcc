//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use api_gateway::config::GatewayConfig;
use api_gateway::error::BoxError;
use api_gateway::http::HttpServer;
use api_gateway::lifecycle::Shutdown;
use api_gateway::routing::{from_fn, Collaborator, MountedPrefix, RouteTable};
use axum::{
    body::{to_bytes, Body},
    extract::connect_info::MockConnectInfo,
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const APP_ORIGIN: &str = "https://app.example.com";
pub const FOREIGN_ORIGIN: &str = "https://evil.example";

/// Counts how often a collaborator was reached.
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Collaborator answering `"<mount name> <path>"`.
pub fn echo(calls: Calls) -> impl Collaborator {
    from_fn(move |request: Request<Body>| {
        calls.hit();
        let mount = request
            .extensions()
            .get::<MountedPrefix>()
            .map(|m| m.name.clone())
            .unwrap_or_default();
        let path = request.uri().path().to_owned();
        async move { Ok::<Response, BoxError>(format!("{mount} {path}").into_response()) }
    })
}

/// Collaborator that always fails.
pub fn failing(calls: Calls) -> impl Collaborator {
    from_fn(move |_request: Request<Body>| {
        calls.hit();
        async { Err::<Response, BoxError>("database connection lost at 10.0.0.9:5432".into()) }
    })
}

/// Collaborator that panics while producing its response.
pub fn panicking() -> impl Collaborator {
    from_fn(|_request: Request<Body>| async {
        if true {
            panic!("collaborator blew up");
        }
        Ok::<Response, BoxError>(Response::default())
    })
}

/// Collaborator that answers only after `delay`.
pub fn stalled(delay: Duration) -> impl Collaborator {
    from_fn(move |_request: Request<Body>| async move {
        tokio::time::sleep(delay).await;
        Ok::<Response, BoxError>("finally".into_response())
    })
}

/// Collaborator returning a large, compressible text body.
pub fn large_text() -> impl Collaborator {
    from_fn(|_request: Request<Body>| async {
        Ok::<Response, BoxError>("all work and no play ".repeat(500).into_response())
    })
}

/// Configuration for a production gateway allowing only [`APP_ORIGIN`].
pub fn production_config() -> GatewayConfig {
    let mut config = GatewayConfig::for_mode("production");
    config.cors.allowed_origins = vec![APP_ORIGIN.to_string()];
    config
}

/// Route table mirroring the default mounts, every collaborator an echo.
pub fn echo_routes(calls: &Calls) -> RouteTable {
    api_gateway::config::DEFAULT_MOUNTS
        .iter()
        .fold(RouteTable::new(), |table, (name, prefix)| {
            table.mount(*name, *prefix, echo(calls.clone()))
        })
}

/// The server's router as seen from a client at `peer`.
pub fn client_view(server: &HttpServer, peer: [u8; 4]) -> Router {
    server
        .router()
        .layer(MockConnectInfo(SocketAddr::from((peer, 40000))))
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_from(uri: &str, origin: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("origin", origin)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Start a simple mock backend on an ephemeral port that answers every
/// request with `200` and `response`. Returns its address.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Run `server` on an ephemeral port. The returned coordinator stops it.
pub async fn spawn_gateway(server: HttpServer) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    (addr, shutdown)
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
