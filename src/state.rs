use std::sync::Arc;

use crate::auth::services::AccessGate;
use crate::config::AppConfig;
use crate::provider::{anthropic::AnthropicClient, mock::MockEstimator, NutritionEstimator};
use crate::storage::TransientStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub gate: Arc<AccessGate>,
    pub estimator: Arc<dyn NutritionEstimator>,
    pub uploads: Arc<TransientStore>,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let estimator = if config.uses_mock_provider() {
            tracing::warn!("no provider key configured or MOCK_API set; serving mock estimates");
            Arc::new(MockEstimator) as Arc<dyn NutritionEstimator>
        } else {
            Arc::new(AnthropicClient::new(&config.provider)?) as Arc<dyn NutritionEstimator>
        };

        Self::from_parts(config, estimator)
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        estimator: Arc<dyn NutritionEstimator>,
    ) -> anyhow::Result<Self> {
        let gate = Arc::new(AccessGate::new(config.app_password.clone()));
        let uploads = Arc::new(TransientStore::new(&config.upload_dir)?);
        Ok(Self {
            config,
            gate,
            estimator,
            uploads,
        })
    }
}
