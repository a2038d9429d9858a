use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::services::AuthError;
use crate::estimate::intake::IntakeError;

/// Errors surfaced to HTTP callers as `{ status, error }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Resource not found")]
    NotFound,
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Intake(IntakeError::PayloadTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Intake(IntakeError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Intake(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(AuthError::MissingCredential) => StatusCode::BAD_REQUEST,
            ApiError::Auth(AuthError::InvalidCredential) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::Intake(IntakeError::Storage(e)) => {
                tracing::error!(error = %e, "failed to store upload");
                "Internal server error".to_string()
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                self.to_string()
            }
            _ => {
                tracing::warn!(%status, error = %self, "request rejected");
                self.to_string()
            }
        };

        (
            status,
            Json(json!({ "status": status.as_u16(), "error": message })),
        )
            .into_response()
    }
}
