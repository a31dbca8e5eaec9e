//! Shared-secret authentication for the operational endpoints.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::crypto::sha256_hex;

use crate::app::AppState;
use crate::error::ApiError;

/// Header carrying the admin key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Compares digests so the check does not short-circuit on the first
/// differing byte of the secret.
fn key_matches(expected: &str, provided: &str) -> bool {
    let expected = sha256_hex(expected);
    let provided = sha256_hex(provided);
    expected
        .bytes()
        .zip(provided.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Rejects requests whose `X-API-Key` does not match `admin.api_key`.
///
/// An empty configured key disables the admin surface entirely.
pub async fn require_admin_key(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let expected = state.config.admin.api_key.as_str();
    if expected.is_empty() {
        return ApiError::Unauthorized("Admin access is disabled".into()).into_response();
    }

    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key_matches(expected, key) => next.run(req).await,
        _ => {
            tracing::warn!(path = %req.uri().path(), "Rejected admin request");
            ApiError::Unauthorized("Invalid or missing API key".into()).into_response()
        }
    }
}
