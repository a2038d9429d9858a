use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::dto::Mode;
use crate::storage::{ext_from_mime, TransientImage, TransientStore};

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("No image file uploaded")]
    NoImageUploaded,
    #[error("Only one image file may be uploaded")]
    MultipleImages,
    #[error("Invalid mode specified. Use \"basic\" or \"detailed\"")]
    InvalidMode,
    #[error("Invalid file type {0:?}. Only JPEG, PNG, WEBP, and HEIC images are allowed.")]
    UnsupportedMediaType(String),
    #[error("Upload exceeds the limit of {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("Malformed upload: {0}")]
    Malformed(String),
    #[error("Could not store upload: {0}")]
    Storage(#[from] std::io::Error),
}

impl IntakeError {
    fn from_multipart(e: MultipartError, limit: usize) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            IntakeError::PayloadTooLarge { limit }
        } else {
            IntakeError::Malformed(e.body_text())
        }
    }
}

/// A validated upload. The file on disk lives exactly as long as this value.
#[derive(Debug)]
pub struct UploadedImage {
    pub file: TransientImage,
    pub mime_type: String,
    pub original_filename: Option<String>,
    pub size: usize,
    pub mode: Mode,
}

impl UploadedImage {
    pub async fn bytes(&self) -> std::io::Result<Vec<u8>> {
        self.file.read().await
    }
}

#[derive(Debug)]
pub struct EstimateForm {
    pub image: UploadedImage,
    pub password: Option<String>,
}

/// Reads the `/api/estimate` form: one `image` file, optional `mode` and `password`.
pub async fn read_estimate_form(
    mp: &mut Multipart,
    store: &TransientStore,
    max_bytes: usize,
) -> Result<EstimateForm, IntakeError> {
    let mut image: Option<UploadedImage> = None;
    let mut mode_raw: Option<String> = None;
    let mut password: Option<String> = None;

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| IntakeError::from_multipart(e, max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                if image.is_some() {
                    return Err(IntakeError::MultipleImages);
                }
                image = Some(store_image(field, store, max_bytes).await?);
            }
            "mode" => {
                mode_raw = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| IntakeError::from_multipart(e, max_bytes))?,
                );
            }
            "password" => {
                password = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| IntakeError::from_multipart(e, max_bytes))?,
                );
            }
            other => debug!(field = other, "ignoring unknown form field"),
        }
    }

    let mut image = image.ok_or(IntakeError::NoImageUploaded)?;
    if let Some(raw) = mode_raw {
        image.mode = raw.parse().map_err(|_| IntakeError::InvalidMode)?;
    }

    Ok(EstimateForm { image, password })
}

/// Streams the image part to transient storage, enforcing type and size.
async fn store_image(
    mut field: Field<'_>,
    store: &TransientStore,
    max_bytes: usize,
) -> Result<UploadedImage, IntakeError> {
    let mime_type = field
        .content_type()
        .map(media_type)
        .unwrap_or_default();
    if ext_from_mime(&mime_type).is_none() {
        return Err(IntakeError::UnsupportedMediaType(mime_type));
    }
    let original_filename = field.file_name().map(str::to_string);

    let (guard, mut out) = store.create(&mime_type).await?;
    debug!(path = %guard.path().display(), "streaming upload to transient storage");
    let mut size = 0usize;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| IntakeError::from_multipart(e, max_bytes))?
    {
        size += chunk.len();
        if size > max_bytes {
            return Err(IntakeError::PayloadTooLarge { limit: max_bytes });
        }
        out.write_all(&chunk).await?;
    }
    out.flush().await?;

    Ok(UploadedImage {
        file: guard,
        mime_type,
        original_filename,
        size,
        mode: Mode::default(),
    })
}

/// `image/JPEG; charset=binary` -> `image/jpeg`
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
