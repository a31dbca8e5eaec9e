//! Integration tests for health probes and request tracing.

mod common;

use axum::http::StatusCode;
use common::{get_request, parse_response_body, TestApp};
use tower::ServiceExt;

#[tokio::test]
async fn test_health_without_database() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body.get("database").is_none());
}

#[tokio::test]
async fn test_liveness_and_readiness() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/health/live"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(parse_response_body(response).await["status"], "alive");

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/health/ready"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(parse_response_body(response).await["status"], "ready");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();

    let request = axum::http::Request::builder()
        .uri("/api/health/live")
        .header("x-request-id", "req-123")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn test_unknown_route() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/nothing-here"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
