//! End-to-end behaviour of the admission pipeline and dispatcher.

use std::time::Duration;

use api_gateway::config::GatewayConfig;
use api_gateway::http::{HttpServer, LIVENESS_MESSAGE};
use api_gateway::routing::RouteTable;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};

mod common;
use common::*;

#[tokio::test]
async fn liveness_is_served_with_security_headers() {
    let server = HttpServer::with_routes(GatewayConfig::default(), RouteTable::new());
    let router = client_view(&server, [10, 0, 0, 1]);

    let response = send(&router, get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-powered-by").is_none());
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "SAMEORIGIN");
    assert!(response.headers().contains_key("content-security-policy"));
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_string(response).await, LIVENESS_MESSAGE);
}

#[tokio::test]
async fn development_admits_any_origin() {
    let calls = Calls::default();
    let server = HttpServer::with_routes(GatewayConfig::default(), echo_routes(&calls));
    let router = client_view(&server, [10, 0, 0, 1]);

    let response = send(&router, get_from("/api/blogs", FOREIGN_ORIGIN)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], FOREIGN_ORIGIN);
    assert_eq!(calls.get(), 1);
}

#[tokio::test]
async fn production_rejects_foreign_origin_before_dispatch() {
    let calls = Calls::default();
    let server = HttpServer::with_routes(production_config(), echo_routes(&calls));
    let router = client_view(&server, [10, 0, 0, 1]);

    let response = send(&router, get_from("/api/blogs", FOREIGN_ORIGIN)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert_eq!(body_string(response).await, r#"{"error":"Not allowed by CORS"}"#);
    assert_eq!(calls.get(), 0);
    assert_eq!(server.rate_limiter().tracked_clients(), 0);
}

#[tokio::test]
async fn production_admits_listed_or_missing_origin() {
    let calls = Calls::default();
    let server = HttpServer::with_routes(production_config(), echo_routes(&calls));
    let router = client_view(&server, [10, 0, 0, 1]);

    let response = send(&router, get_from("/api/blogs/7", APP_ORIGIN)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], APP_ORIGIN);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let response = send(&router, get("/api/blogs/7")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert_eq!(calls.get(), 2);
}

#[tokio::test]
async fn preflight_is_answered_without_counting_or_dispatching() {
    let calls = Calls::default();
    let server = HttpServer::with_routes(production_config(), echo_routes(&calls));
    let router = client_view(&server, [10, 0, 0, 1]);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/auth/login")
        .header("origin", APP_ORIGIN)
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET,POST,PUT,PATCH,DELETE,OPTIONS"
    );
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type,Authorization"
    );
    // CORS answers the pre-flight before the security header stage runs.
    assert!(response.headers().get("x-content-type-options").is_none());
    assert_eq!(calls.get(), 0);
    assert_eq!(server.rate_limiter().tracked_clients(), 0);
}

#[tokio::test(start_paused = true)]
async fn api_quota_is_enforced_per_window() {
    let calls = Calls::default();
    let server = HttpServer::with_routes(production_config(), echo_routes(&calls));
    let router = client_view(&server, [10, 0, 0, 1]);

    for n in 1..=100 {
        let response = send(&router, get("/api/blogs")).await;
        assert_eq!(response.status(), StatusCode::OK, "request {n}");
    }
    assert_eq!(calls.get(), 100);

    let response = send(&router, get_from("/api/blogs", APP_ORIGIN)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["ratelimit-remaining"], "0");
    assert_eq!(response.headers()["ratelimit-limit"], "100");
    assert_eq!(response.headers()["x-ratelimit-limit"], "100");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    assert!(response.headers().contains_key("x-ratelimit-reset"));
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], APP_ORIGIN);
    assert_eq!(response.headers()["x-frame-options"], "SAMEORIGIN");
    assert_eq!(
        body_string(response).await,
        "Too many requests, please try again later."
    );
    assert_eq!(calls.get(), 100);

    // Paths outside /api/ are never limited.
    assert_eq!(send(&router, get("/")).await.status(), StatusCode::OK);

    // Another client has its own window.
    let other = client_view(&server, [10, 0, 0, 2]);
    assert_eq!(send(&other, get("/api/blogs")).await.status(), StatusCode::OK);

    tokio::time::advance(Duration::from_secs(900)).await;
    let response = send(&router, get("/api/blogs")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["ratelimit-remaining"], "99");
}

#[tokio::test]
async fn concurrent_burst_admits_exactly_the_quota() {
    let calls = Calls::default();
    let server = HttpServer::with_routes(GatewayConfig::default(), echo_routes(&calls));
    let router = client_view(&server, [10, 0, 0, 1]);

    let requests = (0..200).map(|_| {
        let router = router.clone();
        tokio::spawn(async move { send(&router, get("/api/analytics")).await.status() })
    });
    let statuses = futures_util::future::join_all(requests).await;

    let admitted = statuses
        .iter()
        .filter(|s| *s.as_ref().unwrap() == StatusCode::OK)
        .count();
    let limited = statuses
        .iter()
        .filter(|s| *s.as_ref().unwrap() == StatusCode::TOO_MANY_REQUESTS)
        .count();
    assert_eq!(admitted, 100);
    assert_eq!(limited, 100);
    assert_eq!(calls.get(), 100);
}

#[tokio::test]
async fn user_search_is_not_shadowed_by_users() {
    let calls = Calls::default();
    let server = HttpServer::with_routes(GatewayConfig::default(), echo_routes(&calls));
    let router = client_view(&server, [10, 0, 0, 1]);

    let response = send(&router, get("/api/users/search?q=ada")).await;
    assert_eq!(body_string(response).await, "user-search /api/users/search");

    let response = send(&router, get("/api/users/42")).await;
    assert_eq!(body_string(response).await, "users /api/users/42");

    let response = send(&router, get("/api/company-value/history")).await;
    assert_eq!(body_string(response).await, "company-value /api/company-value/history");
}

#[tokio::test]
async fn unmatched_path_is_not_found() {
    let calls = Calls::default();
    let server = HttpServer::with_routes(GatewayConfig::default(), echo_routes(&calls));
    let router = client_view(&server, [10, 0, 0, 1]);

    let response = send(&router, get("/api/unknown")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, r#"{"error":"Not found"}"#);

    let post = Request::builder()
        .method(Method::POST)
        .uri("/")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&router, post).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(calls.get(), 0);
}

#[tokio::test]
async fn collaborator_failures_become_generic_500() {
    let calls = Calls::default();
    let routes = RouteTable::new()
        .mount("payment", "/api/payment", failing(calls.clone()))
        .mount("documents", "/api/documents", panicking())
        .mount("blogs", "/api/blogs", echo(calls.clone()));
    let server = HttpServer::with_routes(GatewayConfig::default(), routes);
    let router = client_view(&server, [10, 0, 0, 1]);

    for uri in ["/api/payment/charge", "/api/documents/1"] {
        let response = send(&router, get(uri)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(
            body_string(response).await,
            r#"{"error":"Internal server error"}"#
        );
    }

    let response = send(&router, get("/api/blogs")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calls.get(), 2);
}

#[tokio::test]
async fn static_mounts_serve_files_and_fall_through_on_miss() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("receipts")).unwrap();
    std::fs::write(root.path().join("photo.txt"), "photo").unwrap();
    std::fs::write(root.path().join("receipts/r-1.txt"), "receipt").unwrap();

    let mut config = GatewayConfig::default();
    config.static_files.root = root.path().to_path_buf();
    let calls = Calls::default();
    let routes = RouteTable::new().mount("uploads-api", "/uploads", echo(calls.clone()));
    let server = HttpServer::with_routes(config, routes);
    let router = client_view(&server, [10, 0, 0, 1]);

    let response = send(&router, get("/uploads/photo.txt")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(body_string(response).await, "photo");

    let response = send(&router, get("/receipts/r-1.txt")).await;
    assert_eq!(body_string(response).await, "receipt");

    let response = send(&router, get("/uploads/missing.txt")).await;
    assert_eq!(body_string(response).await, "uploads-api /uploads/missing.txt");
    assert_eq!(calls.get(), 1);

    let response = send(&router, get("/certificates/none.pdf")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let long_name = format!("/receipts/{}", "a".repeat(300));
    let response = send(&router, get(&long_name)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, r#"{"error":"Not found"}"#);
}

#[tokio::test]
async fn per_client_quota_holds_in_process() {
    let calls = Calls::default();
    let mut config = GatewayConfig::default();
    config.rate_limit.max_requests = 1;
    let server = HttpServer::with_routes(config, echo_routes(&calls));

    let first = client_view(&server, [10, 0, 0, 1]);
    let second = client_view(&server, [10, 0, 0, 2]);
    assert_eq!(send(&first, get("/api/blogs")).await.status(), StatusCode::OK);
    assert_eq!(send(&second, get("/api/blogs")).await.status(), StatusCode::OK);
    assert_eq!(
        send(&first, get("/api/blogs")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(server.rate_limiter().tracked_clients(), 2);
}

#[tokio::test(start_paused = true)]
async fn stalled_collaborator_times_out_inside_the_pipeline() {
    let routes = RouteTable::new().mount("documents", "/api/documents", stalled(Duration::from_secs(60)));
    let server = HttpServer::with_routes(production_config(), routes);
    let router = client_view(&server, [10, 0, 0, 1]);

    let response = send(&router, get_from("/api/documents/1", APP_ORIGIN)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], APP_ORIGIN);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        body_string(response).await,
        r#"{"error":"Internal server error"}"#
    );
}

#[tokio::test]
async fn body_limit_applies_to_json_only() {
    let calls = Calls::default();
    let mut config = GatewayConfig::default();
    config.security.max_body_size = 16;
    let server = HttpServer::with_routes(config, echo_routes(&calls));
    let router = client_view(&server, [10, 0, 0, 1]);

    let payload = "x".repeat(64);
    let post = |content_type: &str| {
        Request::builder()
            .method(Method::POST)
            .uri("/api/documents/upload")
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, payload.len())
            .body(Body::from(payload.clone()))
            .unwrap()
    };

    let response = send(&router, post("application/json")).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(calls.get(), 0);

    let response = send(&router, post("multipart/form-data; boundary=xyz")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "documents /api/documents/upload");
    assert_eq!(calls.get(), 1);
}

#[tokio::test]
async fn large_responses_are_compressed_on_request() {
    let routes = RouteTable::new().mount("blogs", "/api/blogs", large_text());
    let server = HttpServer::with_routes(GatewayConfig::default(), routes);
    let router = client_view(&server, [10, 0, 0, 1]);

    let request = Request::builder()
        .uri("/api/blogs")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");

    let response = send(&router, get("/api/blogs")).await;
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());

    let request = Request::builder()
        .uri("/")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    assert_eq!(body_string(response).await, LIVENESS_MESSAGE);
}

#[tokio::test]
async fn request_id_is_propagated() {
    let server = HttpServer::with_routes(GatewayConfig::default(), RouteTable::new());
    let router = client_view(&server, [10, 0, 0, 1]);

    let request = Request::builder()
        .uri("/")
        .header("x-request-id", "trace-abc")
        .body(Body::empty())
        .unwrap();
    let response = send(&router, request).await;
    assert_eq!(response.headers()["x-request-id"], "trace-abc");
}
