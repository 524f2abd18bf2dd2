//! External provider seams
//!
//! Translation and analysis are black boxes reached over HTTP. The traits keep
//! the coordinator and panels independent of any particular vendor.

use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;

use crate::shared::error::{AppError, AppResult};
use crate::shared::settings::HttpSettings;
use crate::shared::types::{LanguageCode, TranslationOutput};

pub mod deepl;
pub mod gemini;

pub use deepl::DeepLProvider;
pub use gemini::GeminiProvider;

#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Translate `text` from `source` into `target`
    async fn translate(
        &self,
        text: &str,
        source: &LanguageCode,
        target: &LanguageCode,
    ) -> AppResult<TranslationOutput>;
}

#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Free-form linguistic analysis of a batch of texts
    async fn analyze(&self, texts: &[String]) -> AppResult<String>;
}

/// Shared client construction so every provider gets the same timeout and agent
pub fn build_http_client(http: &HttpSettings) -> AppResult<Client> {
    Client::builder()
        .user_agent("translation-workspace/0.1")
        .timeout(Duration::from_secs(http.timeout_secs))
        .build()
        .map_err(|e| AppError::Network(e.to_string()))
}

/// Turn a non-success response into a provider error, keeping the status and body
pub(crate) async fn provider_failure(provider: &str, response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    tracing::error!("[{}] API error ({}): {}", provider, status, body);

    let message = if body.is_empty() {
        format!("{} API error: {}", provider, status.as_u16())
    } else {
        format!("{} API error: {} - {}", provider, status.as_u16(), body)
    };
    AppError::provider_status(status.as_u16(), message)
}
