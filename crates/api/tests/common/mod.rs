//! Common test utilities for integration tests.
//!
//! The app runs on the in-memory store and the recording transport, so no
//! database or email provider is needed.

// Not every test file uses every helper.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use domain::models::{EmailTemplates, Event};
use domain::services::{InMemoryStore, MockEmailTransport, Stores};
use event_mailer_api::{
    app::{create_app, AppState},
    config::{
        AdminConfig, BrevoConfig, Config, DatabaseConfig, EmailConfig, LoggingConfig,
        PublicConfig, SchedulerConfig, SecurityConfig, ServerConfig,
    },
};
use fake::faker::name::en::Name;
use fake::Fake;
use std::sync::Arc;
use uuid::Uuid;

pub const ADMIN_KEY: &str = "test-admin-key";
pub const JOIN_URL: &str = "https://meet.example.com/room-42";

/// Test configuration: UTC, templates 1-4, no rate limit, no database.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        },
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 5,
            idle_timeout_secs: 60,
        },
        logging: LoggingConfig {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            cors_origins: vec![],
            rate_limit_per_minute: 0,
        },
        brevo: BrevoConfig::default(),
        email: EmailConfig {
            templates: EmailTemplates {
                registration: Some(1),
                reminder: Some(2),
                join: Some(3),
                followup: Some(4),
            },
            ..EmailConfig::default()
        },
        scheduler: SchedulerConfig::default(),
        admin: AdminConfig {
            api_key: ADMIN_KEY.to_string(),
        },
        public: PublicConfig {
            base_url: "https://events.example.com".to_string(),
        },
    }
}

/// The router together with the fakes behind it.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub transport: Arc<MockEmailTransport>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let transport = Arc::new(MockEmailTransport::new());
        let state = AppState::new(
            config,
            Stores::from_backend(store.clone()),
            transport.clone(),
            None,
        )
        .expect("Failed to build app state");

        Self {
            router: create_app(state),
            store,
            transport,
        }
    }

    /// Inserts an event starting `starts_in` from now, in UTC.
    pub async fn seed_event(&self, starts_in: Duration) -> Event {
        let event = test_event(Utc::now() + starts_in);
        self.store.insert_event(event.clone()).await;
        event
    }
}

pub fn test_event(start: DateTime<Utc>) -> Event {
    let now = Utc::now();
    Event {
        id: Uuid::new_v4(),
        title: "Rust Meetup".to_string(),
        start_date: Some(start.date_naive()),
        start_time: Some(start.time()),
        duration_minutes: Some(60),
        join_url: Some(JOIN_URL.to_string()),
        categories: vec!["meetup".to_string()],
        templates: EmailTemplates::default(),
        list_id: None,
        cancelled: false,
        emails_cancelled: false,
        created_at: now,
        updated_at: now,
    }
}

/// Generate a unique email for testing.
pub fn unique_test_email() -> String {
    format!("test_{}@example.com", Uuid::new_v4().simple())
}

/// A random attendee name.
pub fn fake_name() -> String {
    Name().fake()
}

pub fn registration_uri(event_id: Uuid) -> String {
    format!("/api/v1/events/{}/registrations", event_id)
}

/// Build a JSON request without authentication.
pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Build a form-encoded request.
pub fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build a JSON request with the admin API key.
pub fn json_request_with_api_key(
    method: Method,
    uri: &str,
    body: serde_json::Value,
    api_key: &str,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-API-Key", api_key)
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Build a body-less request with the admin API key.
pub fn request_with_api_key(method: Method, uri: &str, api_key: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-API-Key", api_key)
        .body(Body::empty())
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Parse response body as JSON.
pub async fn parse_response_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
}
