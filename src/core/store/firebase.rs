use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{Collection, RecordStore, StoredEntry};
use crate::core::providers::provider_failure;
use crate::shared::error::{AppError, AppResult};

/// Body returned by a push (POST) to a collection
#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

/// Realtime Database REST store
pub struct FirebaseStore {
    http: Client,
    base_url: String,
    auth_token: RwLock<Option<String>>,
}

impl FirebaseStore {
    pub fn new(http: Client, base_url: impl Into<String>) -> AppResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(AppError::Config("Database URL is not configured".to_string()));
        }
        Ok(Self {
            http,
            base_url,
            auth_token: RwLock::new(None),
        })
    }

    /// ID token of the signed-in user, sent as the `auth` query parameter
    pub fn set_auth_token(&self, token: Option<String>) {
        match self.auth_token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => {
                tracing::warn!("[FirebaseStore] Token lock poisoned, recovering...");
                *poisoned.into_inner() = token;
            }
        }
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        let token = match self.auth_token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match token {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/{}.json", self.base_url, collection.name())
    }

    fn record_url(&self, collection: Collection, id: &str) -> AppResult<String> {
        if id.is_empty() || id.contains(|c: char| matches!(c, '/' | '.' | '#' | '$' | '[' | ']')) {
            return Err(AppError::Validation(format!("Invalid record id: {}", id)));
        }
        Ok(format!("{}/{}/{}.json", self.base_url, collection.name(), id))
    }
}

#[async_trait]
impl RecordStore for FirebaseStore {
    async fn append(&self, collection: Collection, body: serde_json::Value) -> AppResult<String> {
        let response = self
            .with_auth(self.http.post(self.collection_url(collection)))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_failure("Database", response).await);
        }

        let pushed = response
            .json::<PushResponse>()
            .await
            .map_err(|e| AppError::malformed(format!("Failed to parse push response: {}", e)))?;
        Ok(pushed.name)
    }

    async fn list(&self, collection: Collection) -> AppResult<Vec<StoredEntry>> {
        let response = self
            .with_auth(self.http.get(self.collection_url(collection)))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_failure("Database", response).await);
        }

        // Keys are push ids; an empty collection comes back as `null`
        let entries = response
            .json::<Option<BTreeMap<String, serde_json::Value>>>()
            .await
            .map_err(|e| AppError::malformed(format!("Failed to parse collection: {}", e)))?
            .unwrap_or_default();

        Ok(entries
            .into_iter()
            .map(|(id, body)| StoredEntry { id, body })
            .collect())
    }

    async fn delete(&self, collection: Collection, id: &str) -> AppResult<()> {
        let response = self
            .with_auth(self.http.delete(self.record_url(collection, id)?))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_failure("Database", response).await);
        }
        Ok(())
    }

    async fn put(&self, collection: Collection, id: &str, body: serde_json::Value) -> AppResult<()> {
        let response = self
            .with_auth(self.http.put(self.record_url(collection, id)?))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_failure("Database", response).await);
        }
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> AppResult<Option<serde_json::Value>> {
        let response = self
            .with_auth(self.http.get(self.record_url(collection, id)?))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(provider_failure("Database", response).await);
        }

        // A missing key reads back as `null`
        response
            .json::<Option<serde_json::Value>>()
            .await
            .map_err(|e| AppError::malformed(format!("Failed to parse record: {}", e)))
    }
}
