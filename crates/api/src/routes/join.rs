//! Join-link redirect.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::error::ApiError;

/// GET /join/:token
///
/// Records the click (once) and redirects to the event's join URL with a 302.
pub async fn follow_join_link(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let target = state.registrations.follow_join_link(&token).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, target)]).into_response())
}
