use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{provider_failure, AnalysisProvider};
use crate::shared::error::{AppError, AppResult};

// -- Request --

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

// -- Strict Serde Structs for generateContent --

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
pub struct ContentPart {
    pub text: Option<String>,
}

impl GenerateResponse {
    /// First candidate's first text part, which is the analysis body
    pub fn analysis_text(self) -> AppResult<String> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::malformed("No content found in analysis result"))
    }
}

/// Prompt asking for frequent expressions and improvement suggestions
pub fn build_prompt(texts: &[String], commentary_language: &str) -> String {
    let joined = texts
        .iter()
        .enumerate()
        .map(|(i, t)| format!("Text {}:\n{}", i + 1, t))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You're a linguistic analysis tool. Analyze the following collection of texts and return:\n\
         1. A list of the most frequently used expressions (top 10), grouping similar ones.\n\
         2. Suggestions for improving the translation process and the writing quality.\n\
         3. Plain text only, no markdown, bullets or symbols.\n\
         4. Numbered items with clearly titled sections.\n\
         5. Write the commentary in {lang}; quote the texts in their original language.\n\
         6. Keep spacing tidy for readability.\n\
         7. Use the correct native characters of {lang}, never ASCII substitutes.\n\
         8. If the texts are too short, answer only that there is not enough data for analysis.\n\n\
         Texts:\n{joined}\n",
        lang = commentary_language,
        joined = joined,
    )
}

/// Gemini generateContent client
pub struct GeminiProvider {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
    commentary_language: String,
}

impl GeminiProvider {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        commentary_language: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            commentary_language: commentary_language.into(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl AnalysisProvider for GeminiProvider {
    async fn analyze(&self, texts: &[String]) -> AppResult<String> {
        if texts.is_empty() || texts.iter().all(|t| t.trim().is_empty()) {
            return Err(AppError::Validation("Invalid input: no texts to analyze".to_string()));
        }
        if self.api_key.trim().is_empty() {
            return Err(AppError::Validation("Missing API Key".to_string()));
        }

        let prompt = build_prompt(texts, &self.commentary_language);
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: &prompt }],
            }],
        };

        tracing::debug!("[Gemini] Analyzing {} texts with {}", texts.len(), self.model);

        let response = self
            .http
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Analysis API request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(provider_failure("Gemini", response).await);
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| AppError::malformed(format!("Failed to parse analysis response: {}", e)))?
            .analysis_text()
    }
}
