//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseHealth>,
    pub scheduler_enabled: bool,
}

/// Database health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseHealth {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Pings the pool; `None` when the service runs without a database.
async fn database_health(state: &AppState) -> Option<DatabaseHealth> {
    let pool = state.pool.as_ref()?;
    let start = std::time::Instant::now();
    let connected = persistence::db::ping(pool).await.is_ok();
    persistence::metrics::record_pool_state(pool);
    Some(DatabaseHealth {
        connected,
        latency_ms: connected.then(|| start.elapsed().as_millis() as u64),
    })
}

/// Full health check endpoint.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let database = database_health(&state).await;
    let healthy = database.as_ref().map_or(true, |db| db.connected);

    if !healthy {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        scheduler_enabled: state.config.scheduler.enabled,
    }))
}

/// Liveness probe endpoint.
///
/// Returns 200 OK if the process is running.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 OK if the service can accept traffic (database reachable).
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    match database_health(&state).await {
        Some(db) if !db.connected => Err(StatusCode::SERVICE_UNAVAILABLE),
        _ => Ok(Json(StatusResponse {
            status: "ready".to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_without_database() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            database: None,
            scheduler_enabled: true,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("database").is_none());
        assert_eq!(json["scheduler_enabled"], true);
    }

    #[test]
    fn test_database_health_serialization() {
        let health = DatabaseHealth {
            connected: true,
            latency_ms: Some(4),
        };
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["connected"], true);
        assert_eq!(json["latency_ms"], 4);
    }
}
