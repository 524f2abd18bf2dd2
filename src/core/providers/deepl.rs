use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{provider_failure, TranslationProvider};
use crate::shared::error::{AppError, AppResult};
use crate::shared::types::{LanguageCode, TranslationOutput};

// -- Strict Serde Structs for DeepL v2 --

#[derive(Debug, Deserialize)]
pub struct DeepLResponse {
    #[serde(default)]
    pub translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
pub struct DeepLTranslation {
    pub text: String,
    pub detected_source_language: Option<String>,
}

impl DeepLResponse {
    fn into_output(self) -> AppResult<TranslationOutput> {
        let first = self
            .translations
            .into_iter()
            .next()
            .ok_or_else(|| AppError::malformed("Translation response contained no translations"))?;
        Ok(TranslationOutput {
            translated: first.text,
            detected_source_lang: first.detected_source_language,
        })
    }
}

/// DeepL translation client
pub struct DeepLProvider {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl DeepLProvider {
    pub fn new(http: Client, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl TranslationProvider for DeepLProvider {
    async fn translate(
        &self,
        text: &str,
        source: &LanguageCode,
        target: &LanguageCode,
    ) -> AppResult<TranslationOutput> {
        if text.trim().is_empty() {
            return Err(AppError::Validation("Missing 'text' parameter".to_string()));
        }
        if self.api_key.trim().is_empty() {
            return Err(AppError::Validation("Missing API Key".to_string()));
        }

        tracing::debug!("[DeepL] Translating from {} to {}", source, target);

        let form = [
            ("text", text),
            ("source_lang", source.as_str()),
            ("target_lang", target.as_str()),
        ];

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Translation API request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(provider_failure("DeepL", response).await);
        }

        let parsed = response
            .json::<DeepLResponse>()
            .await
            .map_err(|e| AppError::malformed(format!("Failed to parse translation API response: {}", e)))?;

        parsed.into_output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn codes() -> (LanguageCode, LanguageCode) {
        (LanguageCode::parse("EN").unwrap(), LanguageCode::parse("TR").unwrap())
    }

    #[tokio::test]
    async fn test_translate_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/translate")
            .match_header("authorization", "DeepL-Auth-Key secret")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("text".into(), "hello".into()),
                Matcher::UrlEncoded("source_lang".into(), "EN".into()),
                Matcher::UrlEncoded("target_lang".into(), "TR".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"translations":[{"detected_source_language":"EN","text":"merhaba"}]}"#)
            .create_async()
            .await;

        let provider = DeepLProvider::new(Client::new(), format!("{}/v2/translate", server.url()), "secret");
        let (en, tr) = codes();
        let out = provider.translate("hello", &en, &tr).await.unwrap();

        assert_eq!(out.translated, "merhaba");
        assert_eq!(out.detected_source_lang.as_deref(), Some("EN"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_carried_through() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v2/translate")
            .with_status(456)
            .with_body(r#"{"message":"Quota exceeded"}"#)
            .create_async()
            .await;

        let provider = DeepLProvider::new(Client::new(), format!("{}/v2/translate", server.url()), "secret");
        let (en, tr) = codes();
        let err = provider.translate("hello", &en, &tr).await.unwrap_err();

        match err {
            AppError::Provider { status, message } => {
                assert_eq!(status, Some(456));
                assert!(message.contains("Quota exceeded"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_translations_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v2/translate")
            .with_status(200)
            .with_body(r#"{"translations":[]}"#)
            .create_async()
            .await;

        let provider = DeepLProvider::new(Client::new(), format!("{}/v2/translate", server.url()), "secret");
        let (en, tr) = codes();
        let err = provider.translate("hello", &en, &tr).await.unwrap_err();
        assert!(matches!(err, AppError::Provider { status: None, .. }));
    }

    #[tokio::test]
    async fn test_missing_key_rejected_before_request() {
        let mut server = Server::new_async().await;
        let mock = server.mock("POST", Matcher::Any).expect(0).create_async().await;

        let provider = DeepLProvider::new(Client::new(), server.url(), "");
        let (en, tr) = codes();
        let err = provider.translate("hello", &en, &tr).await.unwrap_err();

        assert!(err.is_validation());
        mock.assert_async().await;
    }
}
