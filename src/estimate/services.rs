use tracing::error;

use super::dto::MacroEstimate;
use super::intake::UploadedImage;
use super::normalize::{fallback, normalize, FallbackReason};
use crate::provider::mock::MockEstimator;
use crate::state::AppState;

/// Runs the estimator and normalizes its reply. Provider failures become a
/// fallback estimate; this never fails.
pub async fn estimate_macros(state: &AppState, image: &UploadedImage, no_food: bool) -> MacroEstimate {
    if no_food && state.config.uses_mock_provider() {
        return normalize(&MockEstimator::no_food_reply(), image.mode);
    }

    match state.estimator.estimate(image).await {
        Ok(raw) => normalize(&raw, image.mode),
        Err(e) => {
            error!(error = %e, provider = state.estimator.name(), "estimation failed; serving fallback");
            fallback(image.mode, FallbackReason::from(&e))
        }
    }
}
