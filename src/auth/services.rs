use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Password is required")]
    MissingCredential,
    #[error("Invalid password")]
    InvalidCredential,
}

/// Shared-password check. Plain string equality: no hashing, lockout or
/// throttling, so it only keeps casual visitors out.
#[derive(Debug, Clone)]
pub struct AccessGate {
    secret: String,
}

impl AccessGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn verify(&self, candidate: &str) -> bool {
        candidate == self.secret
    }

    pub fn check(&self, candidate: Option<&str>) -> Result<(), AuthError> {
        match candidate {
            None | Some("") => Err(AuthError::MissingCredential),
            Some(c) if self.verify(c) => Ok(()),
            Some(_) => Err(AuthError::InvalidCredential),
        }
    }
}

/// Stringifies a submitted JSON password so `2911` and `"2911"` compare alike.
pub fn candidate_from_json(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
