use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{errors::ApiError, state::AppState};

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(anyhow::Error::from)?;
    Ok(Json(json!({
        "status": "ok",
        "timestamp": timestamp,
        "provider": state.estimator.name(),
    })))
}
