pub mod dto;
pub mod handlers;
pub mod intake;
pub mod normalize;
mod services;

use crate::state::AppState;
use axum::Router;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new().merge(handlers::estimate_routes(max_upload_bytes))
}
