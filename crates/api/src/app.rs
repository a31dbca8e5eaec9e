use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use domain::services::{EmailTransport, RegistrationService, SchedulingEngine, Stores};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{Config, ConfigValidationError};
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, require_admin_key, trace_id,
    RateLimiterState,
};
use crate::routes::{admin, health, join, registrations};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Stores,
    pub registrations: RegistrationService,
    pub engine: SchedulingEngine,
    /// Present in production; health probes report the database only then.
    pub pool: Option<PgPool>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    /// Wires the registration service and the scheduling engine onto the
    /// given stores and transport.
    pub fn new(
        config: Config,
        stores: Stores,
        transport: Arc<dyn EmailTransport>,
        pool: Option<PgPool>,
    ) -> Result<Self, ConfigValidationError> {
        let settings = Arc::new(config.email_settings()?);
        let registrations =
            RegistrationService::new(stores.clone(), transport.clone(), settings.clone());
        let engine = SchedulingEngine::new(stores.clone(), transport, settings);
        let rate_limiter = RateLimiterState::new(config.security.rate_limit_per_minute).map(Arc::new);

        Ok(Self {
            config: Arc::new(config),
            stores,
            registrations,
            engine,
            pool,
            rate_limiter,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Registration form submissions, limited per client address
    let registration_routes = Router::new()
        .route(
            "/api/v1/events/:event_id/registrations",
            post(registrations::register),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    // Operational endpoints (require the admin API key)
    let admin_routes = Router::new()
        .route("/api/v1/admin/events", post(admin::create_event))
        .route("/api/v1/admin/events/:event_id", get(admin::get_event))
        .route(
            "/api/v1/admin/events/:event_id/cancel",
            post(admin::cancel_event),
        )
        .route(
            "/api/v1/admin/events/:event_id/emails-cancelled",
            put(admin::set_emails_cancelled),
        )
        .route(
            "/api/v1/admin/email-schedule/run",
            post(admin::run_email_schedule),
        )
        .route(
            "/api/v1/admin/registrations/:registration_id",
            get(admin::get_registration),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_key,
        ));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler))
        .route("/join/:token", get(join::follow_join_link));

    Router::new()
        .merge(public_routes)
        .merge(registration_routes)
        .merge(admin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
