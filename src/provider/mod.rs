use async_trait::async_trait;
use thiserror::Error;

use crate::estimate::intake::UploadedImage;

pub mod anthropic;
pub mod mock;
mod prompt;
pub mod retry;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("provider reply is not a readable Messages response")]
    MalformedReply,
    #[error("could not read uploaded image: {0}")]
    Image(#[from] std::io::Error),
}

impl ProviderError {
    /// HTTP status of the provider reply, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Something that turns an uploaded meal photo into the model's raw text reply.
#[async_trait]
pub trait NutritionEstimator: Send + Sync {
    async fn estimate(&self, image: &UploadedImage) -> Result<String, ProviderError>;

    fn name(&self) -> &'static str;
}
