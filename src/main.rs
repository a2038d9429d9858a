mod app;
mod auth;
mod config;
mod errors;
mod estimate;
mod health;
mod provider;
mod state;
mod storage;
#[cfg(test)]
mod test_support;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "mymacros=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init()?;
    tracing::info!(
        provider = app_state.estimator.name(),
        upload_dir = %app_state.uploads.dir().display(),
        max_upload_bytes = app_state.config.max_upload_bytes,
        "starting mymacros"
    );

    app::serve(app::build_app(app_state)).await
}
