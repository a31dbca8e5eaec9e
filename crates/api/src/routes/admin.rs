//! Operational endpoints.
//!
//! Event catalog management, cancellation and a manual trigger for the daily
//! batch. All routes require the admin API key.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::{CreateEventRequest, Event, NewEvent, RegistrationStatus, ScheduledEmail};
use domain::services::{
    BatchReport, CancellationReport, EventCatalog, RegistrationStore, ScheduledEmailStore,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::record_batch;

/// An event with its batch audit records.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EventDetails {
    pub event: Event,
    pub scheduled_emails: Vec<ScheduledEmail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmailsCancelledRequest {
    pub emails_cancelled: bool,
}

async fn load_event(state: &AppState, event_id: Uuid) -> Result<Event, ApiError> {
    state
        .stores
        .events
        .find_event(event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".into()))
}

/// POST /api/v1/admin/events
pub async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    request.validate()?;

    let event = state
        .stores
        .events
        .create_event(NewEvent::from(request))
        .await?;
    info!(event_id = %event.id, title = %event.title, "Event created");

    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /api/v1/admin/events/:event_id
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventDetails>, ApiError> {
    let event = load_event(&state, event_id).await?;
    let scheduled_emails = state
        .stores
        .scheduled_emails
        .list_for_event(event_id)
        .await?;

    Ok(Json(EventDetails {
        event,
        scheduled_emails,
    }))
}

/// POST /api/v1/admin/events/:event_id/cancel
///
/// Permanent. Provider-side scheduled messages are cancelled best-effort; the
/// report says how many could not be.
pub async fn cancel_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<CancellationReport>, ApiError> {
    load_event(&state, event_id).await?;
    let report = state.engine.cancel_event(event_id, Utc::now()).await?;
    Ok(Json(report))
}

/// PUT /api/v1/admin/events/:event_id/emails-cancelled
///
/// Pauses or resumes the batch for one event.
pub async fn set_emails_cancelled(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(request): Json<EmailsCancelledRequest>,
) -> Result<Json<Event>, ApiError> {
    let event = state
        .stores
        .events
        .set_emails_cancelled(event_id, request.emails_cancelled)
        .await?;
    info!(
        event_id = %event_id,
        emails_cancelled = request.emails_cancelled,
        "Scheduled emails toggled"
    );
    Ok(Json(event))
}

/// POST /api/v1/admin/email-schedule/run
///
/// Runs the daily batch now. Safe to repeat: already-sent types are skipped.
pub async fn run_email_schedule(
    State(state): State<AppState>,
) -> Result<Json<BatchReport>, ApiError> {
    info!("Manual email schedule run requested");
    let report = state.engine.run(Utc::now()).await?;
    record_batch(&report);
    Ok(Json(report))
}

/// GET /api/v1/admin/registrations/:registration_id
pub async fn get_registration(
    State(state): State<AppState>,
    Path(registration_id): Path<Uuid>,
) -> Result<Json<RegistrationStatus>, ApiError> {
    let registration = state
        .stores
        .registrations
        .find_by_id(registration_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Registration not found".into()))?;

    Ok(Json(RegistrationStatus::from(registration)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emails_cancelled_request_deserialize() {
        let request: EmailsCancelledRequest =
            serde_json::from_str(r#"{"emails_cancelled": true}"#).unwrap();
        assert!(request.emails_cancelled);
        assert!(serde_json::from_str::<EmailsCancelledRequest>("{}").is_err());
    }
}
