use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::QueryRejection,
        DefaultBodyLimit, Multipart, Query, State,
    },
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument};

use super::dto::MacroEstimate;
use super::intake::{read_estimate_form, IntakeError};
use super::services::estimate_macros;
use crate::{errors::ApiError, state::AppState};

/// Multipart framing allowance on top of the image size ceiling.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn estimate_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/api/estimate", post(estimate))
        .layer(DefaultBodyLimit::max(max_upload_bytes + FORM_OVERHEAD_BYTES))
}

#[derive(Debug, Default, Deserialize)]
pub struct EstimateQuery {
    #[serde(default, rename = "noFood")]
    pub no_food: bool,
}

/// POST /api/estimate (multipart: image, mode?, password?)
///
/// Provider failures are answered with `200` and a fallback estimate
/// carrying `error`; only input and credential problems produce 4xx.
#[instrument(skip(state, mp))]
pub async fn estimate(
    State(state): State<AppState>,
    query: Result<Query<EstimateQuery>, QueryRejection>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<MacroEstimate>, ApiError> {
    let Query(query) = query.map_err(|e| IntakeError::Malformed(e.body_text()))?;
    let mut mp = mp.map_err(|e| IntakeError::Malformed(e.body_text()))?;
    let form = read_estimate_form(&mut mp, &state.uploads, state.config.max_upload_bytes).await?;

    if state.config.estimate_requires_password {
        state.gate.check(form.password.as_deref())?;
    }

    let image = form.image;
    info!(
        filename = image.original_filename.as_deref().unwrap_or("<unnamed>"),
        mime = %image.mime_type,
        size = image.size,
        mode = %image.mode,
        "processing upload"
    );

    let estimate = estimate_macros(&state, &image, query.no_food).await;
    info!(degraded = estimate.is_degraded(), "estimate ready");
    Ok(Json(estimate))
}
