use thiserror::Error;
use serde::Serialize;

/// Errors surfaced by workspace operations
///
/// All variants are serializable so the UI shell can render them as notices.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    #[error("I/O Error: {0}")]
    Io(String),

    #[error("Network Error: {0}")]
    Network(String),

    /// Non-success status or malformed body from an external provider.
    /// `status` is the HTTP status carried through unchanged (None when the body was the problem).
    #[error("Provider Error ({}): {message}", status.map(|s| s.to_string()).unwrap_or_else(|| "malformed response".to_string()))]
    Provider { status: Option<u16>, message: String },

    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Storage Error: {0}")]
    Storage(String),

    #[error("Auth Error: {0}")]
    Auth(String),

    #[error("Config Error: {0}")]
    Config(String),
}

impl AppError {
    pub fn provider_status(status: u16, message: impl Into<String>) -> Self {
        AppError::Provider {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        AppError::Provider {
            status: None,
            message: message.into(),
        }
    }

    /// Validation failures are rejected before any network call
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("Serialization error: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;
