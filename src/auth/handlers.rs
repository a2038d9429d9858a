use axum::{extract::State, routing::post, Json, Router};
use bytes::Bytes;
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{VerifyRequest, VerifyResponse},
        services::candidate_from_json,
    },
    errors::ApiError,
    state::AppState,
};

pub fn verify_routes() -> Router<AppState> {
    Router::new().route("/api/verify", post(verify))
}

/// POST /api/verify { password }
///
/// Takes the raw body so a missing or unreadable body is a 400 rather than
/// an extractor rejection.
#[instrument(skip(state, body))]
pub async fn verify(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<VerifyResponse>, ApiError> {
    let payload: VerifyRequest = serde_json::from_slice(&body).unwrap_or_default();
    let candidate = payload.password.as_ref().and_then(candidate_from_json);

    state.gate.check(candidate.as_deref())?;

    info!("password verified");
    Ok(Json(VerifyResponse {
        status: 200,
        message: "Authentication successful",
    }))
}
