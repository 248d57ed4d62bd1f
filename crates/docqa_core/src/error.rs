use serde::{Deserialize, Serialize};
use std::fmt;

pub const CODE_RATE_LIMITED: &str = "AI_PROVIDER_RATE_LIMITED";
pub const CODE_UNAVAILABLE: &str = "AI_PROVIDER_UNAVAILABLE";
pub const CODE_REJECTED: &str = "AI_PROVIDER_REJECTED";

/// Single structured error shape shared by ingestion, retrieval and the turn loop.
///
/// `code` is stable and machine-matchable; `message` is safe to show to a user;
/// `details` carries diagnostics for logs only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Provider throttled the call; the caller may back off and retry.
    pub fn is_rate_limited(&self) -> bool {
        self.code == CODE_RATE_LIMITED
    }

    /// Network or auth failure talking to a provider.
    pub fn is_provider_unavailable(&self) -> bool {
        self.code == CODE_UNAVAILABLE
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
