use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-3-opus-20240229";
const DEFAULT_API_VERSION: &str = "2023-06-01";
const PLACEHOLDER_KEY: &str = "your-key-here";

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// `None` when no usable key is configured; the mock estimator is used instead.
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub api_version: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_password: String,
    pub provider: ProviderConfig,
    pub max_upload_bytes: usize,
    pub upload_dir: PathBuf,
    pub mock_api: bool,
    pub estimate_requires_password: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let app_password = std::env::var("APP_PASSWORD").context("APP_PASSWORD must be set")?;

        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != PLACEHOLDER_KEY);

        let provider = ProviderConfig {
            api_key,
            api_url: std::env::var("ANTHROPIC_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into()),
            model: std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into()),
            api_version: std::env::var("ANTHROPIC_VERSION")
                .unwrap_or_else(|_| DEFAULT_API_VERSION.into()),
            max_tokens: parsed_var("ANTHROPIC_MAX_TOKENS").unwrap_or(300),
            temperature: parsed_var("ANTHROPIC_TEMPERATURE").unwrap_or(0.3),
            timeout_secs: parsed_var("PROVIDER_TIMEOUT_SECS").unwrap_or(60),
        };

        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("mymacros-uploads"));

        Ok(Self {
            app_password,
            provider,
            max_upload_bytes: parsed_var("MAX_FILE_SIZE").unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            upload_dir,
            mock_api: flag_var("MOCK_API").unwrap_or(false),
            estimate_requires_password: flag_var("ESTIMATE_REQUIRES_PASSWORD").unwrap_or(true),
        })
    }

    /// True when estimates are served by the canned mock instead of the provider.
    pub fn uses_mock_provider(&self) -> bool {
        self.mock_api || self.provider.api_key.is_none()
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn flag_var(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

#[cfg(test)]
pub(crate) fn test_config(upload_dir: PathBuf) -> AppConfig {
    AppConfig {
        app_password: "2911".into(),
        provider: ProviderConfig {
            api_key: Some("test-key".into()),
            api_url: "http://127.0.0.1:9/v1/messages".into(),
            model: DEFAULT_MODEL.into(),
            api_version: DEFAULT_API_VERSION.into(),
            max_tokens: 300,
            temperature: 0.3,
            timeout_secs: 5,
        },
        max_upload_bytes: 1024,
        upload_dir,
        mock_api: false,
        estimate_requires_password: true,
    }
}
