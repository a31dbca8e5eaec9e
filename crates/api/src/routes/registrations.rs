//! Public registration endpoint.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use domain::models::RegisterResponse;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::RegistrationPayload;
use crate::middleware::metrics::record_registration;

/// POST /api/v1/events/:event_id/registrations
///
/// `201` for a new registration, `200` with `already_registered` for a
/// repeat. The instant email is best-effort: its failure is reported in
/// `email_error`, never as an error status.
pub async fn register(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    RegistrationPayload(request): RegistrationPayload,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let response = state
        .registrations
        .register(event_id, request, Utc::now())
        .await?;

    let status = if response.already_registered {
        record_registration("repeat");
        StatusCode::OK
    } else {
        record_registration("created");
        StatusCode::CREATED
    };

    Ok((status, Json(response)))
}
