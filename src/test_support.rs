//! Helpers shared by the router tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use crate::config::{test_config, AppConfig};
use crate::estimate::intake::UploadedImage;
use crate::provider::{NutritionEstimator, ProviderError};
use crate::state::AppState;

pub enum FakeReply {
    Text(String),
    Status(u16),
}

/// Estimator that answers with a fixed reply and counts its calls.
pub struct FakeEstimator {
    reply: FakeReply,
    calls: AtomicUsize,
    saw_file_on_disk: AtomicUsize,
}

impl FakeEstimator {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self::new(FakeReply::Text(text.to_string())))
    }

    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self::new(FakeReply::Status(status)))
    }

    fn new(reply: FakeReply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            saw_file_on_disk: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn saw_file_on_disk(&self) -> usize {
        self.saw_file_on_disk.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NutritionEstimator for FakeEstimator {
    async fn estimate(&self, image: &UploadedImage) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image.file.path().exists() {
            self.saw_file_on_disk.fetch_add(1, Ordering::SeqCst);
        }
        match &self.reply {
            FakeReply::Text(text) => Ok(text.clone()),
            FakeReply::Status(status) => Err(ProviderError::Status {
                status: *status,
                body: "scripted failure".into(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub fn config(upload_dir: &Path) -> AppConfig {
    test_config(upload_dir.to_path_buf())
}

pub fn state(cfg: AppConfig, estimator: Arc<dyn NutritionEstimator>) -> AppState {
    AppState::from_parts(Arc::new(cfg), estimator).unwrap()
}

pub fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

const BOUNDARY: &str = "mymacros-test-boundary";

/// Builds a `multipart/form-data` body by hand.
#[derive(Default)]
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

pub fn json_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Sends `req` through `app` and returns the status and JSON body.
pub async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
