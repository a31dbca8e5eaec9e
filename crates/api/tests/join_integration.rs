//! Integration tests for personalized join-link redirects.

mod common;

use axum::http::{header, Method, StatusCode};
use chrono::{Duration, Utc};
use common::{
    get_request, json_request, registration_uri, test_event, unique_test_email, TestApp,
    JOIN_URL,
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

/// Registers one attendee and returns their join token.
async fn register(app: &TestApp, event_id: Uuid) -> String {
    let request = json_request(
        Method::POST,
        &registration_uri(event_id),
        json!({"email": unique_test_email(), "name": "Joiner"}),
    );
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    app.store.registrations().await[0].join_token.clone()
}

#[tokio::test]
async fn test_join_link_redirects_and_records_click() {
    let app = TestApp::new();
    let event = app.seed_event(Duration::hours(30)).await;
    let token = register(&app, event.id).await;

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/join/{}", token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], JOIN_URL);
    assert!(app.store.registrations().await[0].clicked_join_link);

    // Following the link again still redirects.
    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/join/{}", token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_join_link_matches_emailed_link() {
    let app = TestApp::new();
    let event = app.seed_event(Duration::hours(30)).await;
    let token = register(&app, event.id).await;

    let confirmation = &app.transport.sent().await[0];
    assert_eq!(
        confirmation.params["JOIN_URL"],
        format!("https://events.example.com/join/{}", token)
    );
}

#[tokio::test]
async fn test_unknown_join_token() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(get_request("/join/does-not-exist"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_join_link_without_event_url() {
    let app = TestApp::new();
    let mut event = test_event(Utc::now() + Duration::hours(30));
    event.join_url = None;
    app.store.insert_event(event.clone()).await;
    let token = register(&app, event.id).await;

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/join/{}", token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(!app.store.registrations().await[0].clicked_join_link);
}
