use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use event_mailer_api::app::{create_app, AppState};
use event_mailer_api::config::Config;
use event_mailer_api::jobs::{EmailScheduleJob, JobScheduler, SendClaimCleanupJob};
use event_mailer_api::middleware::{init_metrics, logging::init_logging};
use event_mailer_api::services::BrevoClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    init_logging(&config.logging);
    init_metrics().context("Failed to install Prometheus recorder")?;

    info!("Starting Event Mailer API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&config.database.pool_config()).await?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let transport = Arc::new(BrevoClient::new(&config.brevo)?);
    let stores = persistence::pg_stores(pool.clone());

    let addr = config.socket_addr()?;
    let scheduler_config = config.scheduler.clone();
    let run_at = scheduler_config.run_time()?;
    let timezone = config.email.timezone()?;

    let state = AppState::new(config, stores.clone(), transport, Some(pool))?;

    let mut scheduler = JobScheduler::new();
    if scheduler_config.enabled {
        scheduler.register(EmailScheduleJob::new(
            state.engine.clone(),
            run_at,
            timezone,
        ));
        scheduler.register(SendClaimCleanupJob::new(
            stores.send_guard.clone(),
            scheduler_config.claim_cleanup_interval_minutes,
        ));
        scheduler.start();
    } else {
        info!("Background jobs disabled");
    }

    let app = create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(30)).await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
