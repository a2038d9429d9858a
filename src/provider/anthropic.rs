use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::prompt::{user_prompt, SYSTEM_PROMPT};
use super::retry::{RetryDecision, RetryPolicy};
use super::{NutritionEstimator, ProviderError};
use crate::config::ProviderConfig;
use crate::estimate::dto::Mode;
use crate::estimate::intake::UploadedImage;

/// Client for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    api_url: String,
    model: String,
    api_version: String,
    max_tokens: u32,
    temperature: f32,
    retry: RetryPolicy,
}

/// Everything needed for one outbound call, reused across retries.
#[derive(Debug)]
pub struct EstimationRequest {
    pub payload_b64: String,
    pub mime_type: String,
    pub mode: Mode,
    pub prompt: &'static str,
}

impl EstimationRequest {
    pub fn new(image_bytes: &[u8], mime_type: &str, mode: Mode) -> Self {
        Self {
            payload_b64: general_purpose::STANDARD.encode(image_bytes),
            mime_type: mime_type.to_string(),
            mode,
            prompt: user_prompt(mode),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ReplyBlock>,
}

#[derive(Debug, Deserialize)]
struct ReplyBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClient {
    pub fn new(cfg: &ProviderConfig) -> anyhow::Result<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .context("ANTHROPIC_API_KEY is required for the Anthropic client")?;
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            api_url: cfg.api_url.clone(),
            model: cfg.model.clone(),
            api_version: cfg.api_version.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sends `request`, retrying transient failures per the retry policy.
    #[instrument(skip(self, request), fields(mode = %request.mode))]
    pub async fn send(&self, request: &EstimationRequest) -> Result<String, ProviderError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match self.send_once(request).await {
                Ok(text) => {
                    info!(attempt, "provider reply received");
                    return Ok(text);
                }
                Err(e) => e,
            };

            match self.retry.next_action(attempt, err.status()) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "provider call failed; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    warn!(attempt, error = %err, "provider call failed; giving up");
                    return Err(err);
                }
            }
        }
    }

    async fn send_once(&self, request: &EstimationRequest) -> Result<String, ProviderError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Text {
                        text: request.prompt,
                    },
                    ContentBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: &request.mime_type,
                            data: &request.payload_b64,
                        },
                    },
                ],
            }],
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response.bytes().await?;
        let reply: MessagesResponse = serde_json::from_slice(&raw).map_err(|e| {
            warn!(error = %e, "provider reply body is not a Messages response");
            ProviderError::MalformedReply
        })?;
        reply
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or(ProviderError::MalformedReply)
    }
}

#[async_trait]
impl NutritionEstimator for AnthropicClient {
    async fn estimate(&self, image: &UploadedImage) -> Result<String, ProviderError> {
        let bytes = image.bytes().await?;
        let request = EstimationRequest::new(&bytes, &image.mime_type, image.mode);
        self.send(&request).await
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    use super::*;

    #[derive(Clone, Default)]
    struct Recorded {
        calls: Arc<Mutex<Vec<(Instant, HeaderMap, Value)>>>,
    }

    #[derive(Clone)]
    struct FakeProvider {
        script: Arc<Vec<u16>>,
        recorded: Recorded,
    }

    async fn fake_messages(
        State(fake): State<FakeProvider>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let n = {
            let mut calls = fake.recorded.calls.lock().unwrap();
            calls.push((Instant::now(), headers, body));
            calls.len() - 1
        };
        let status = fake.script[n.min(fake.script.len() - 1)];
        let code = StatusCode::from_u16(status).unwrap();
        if code.is_success() {
            (
                code,
                Json(json!({
                    "content": [{"type": "text", "text": "{\"calories\": 410}"}]
                })),
            )
        } else {
            (code, Json(json!({"error": {"message": "scripted failure"}})))
        }
    }

    /// Serves a provider that answers with the scripted statuses in order.
    async fn spawn_provider(script: Vec<u16>) -> (String, Recorded) {
        let recorded = Recorded::default();
        let app = Router::new()
            .route("/v1/messages", post(fake_messages))
            .with_state(FakeProvider {
                script: Arc::new(script),
                recorded: recorded.clone(),
            });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1/messages"), recorded)
    }

    fn client(api_url: String) -> AnthropicClient {
        let mut cfg = crate::config::test_config(std::env::temp_dir()).provider;
        cfg.api_url = api_url;
        AnthropicClient::new(&cfg)
            .unwrap()
            .with_retry_policy(RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(10),
            })
    }

    fn request(mode: Mode) -> EstimationRequest {
        EstimationRequest::new(b"jpeg-bytes", "image/jpeg", mode)
    }

    #[tokio::test]
    async fn retries_rate_limits_with_growing_backoff() {
        let (url, recorded) = spawn_provider(vec![429, 429, 200]).await;

        let text = client(url).send(&request(Mode::Basic)).await.unwrap();
        assert_eq!(text, "{\"calories\": 410}");

        let calls = recorded.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        let first_gap = calls[1].0 - calls[0].0;
        let second_gap = calls[2].0 - calls[1].0;
        assert!(first_gap >= Duration::from_millis(20), "{first_gap:?}");
        assert!(second_gap >= Duration::from_millis(40), "{second_gap:?}");
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let (url, recorded) = spawn_provider(vec![401, 200]).await;

        let err = client(url).send(&request(Mode::Basic)).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(recorded.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn server_errors_exhaust_after_three_attempts() {
        let (url, recorded) = spawn_provider(vec![500]).await;

        let err = client(url).send(&request(Mode::Detailed)).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(recorded.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn network_failure_is_terminal() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/v1/messages", listener.local_addr().unwrap());
        drop(listener);

        let err = client(url).send(&request(Mode::Basic)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)), "{err}");
    }

    #[tokio::test]
    async fn request_carries_one_inline_image_and_headers() {
        let (url, recorded) = spawn_provider(vec![200]).await;

        client(url).send(&request(Mode::Detailed)).await.unwrap();

        let calls = recorded.calls.lock().unwrap();
        let (_, headers, body) = &calls[0];
        assert_eq!(headers["x-api-key"], "test-key");
        assert_eq!(headers["anthropic-version"], "2023-06-01");
        assert_eq!(body["system"], SYSTEM_PROMPT);

        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "text");
        assert!(content[0]["text"].as_str().unwrap().contains("ingredients"));
        assert_eq!(content[1]["type"], "image");
        assert_eq!(content[1]["source"]["type"], "base64");
        assert_eq!(content[1]["source"]["media_type"], "image/jpeg");
        assert_eq!(
            content[1]["source"]["data"],
            general_purpose::STANDARD.encode(b"jpeg-bytes")
        );
    }

    #[tokio::test]
    async fn reply_without_text_block_is_malformed() {
        async fn empty_reply() -> Json<Value> {
            Json(json!({"content": []}))
        }
        let app = Router::new().route("/v1/messages", post(empty_reply));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let err = client(format!("http://{addr}/v1/messages"))
            .send(&request(Mode::Basic))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MalformedReply));
    }

    #[tokio::test]
    async fn undecodable_success_body_is_malformed_not_network() {
        async fn html_reply() -> &'static str {
            "<html>gateway says hi</html>"
        }
        let app = Router::new().route("/v1/messages", post(html_reply));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let err = client(format!("http://{addr}/v1/messages"))
            .send(&request(Mode::Basic))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MalformedReply), "{err}");
        assert_eq!(err.status(), None);
    }
}
