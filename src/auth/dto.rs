use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for `/api/verify`. The password may arrive as a string or a number.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub password: Option<Value>,
}

/// Response returned after a successful password check.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub status: u16,
    pub message: &'static str,
}
