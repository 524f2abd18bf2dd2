use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{Collection, RecordStore, StoredEntry};
use crate::shared::error::{AppError, AppResult};

/// In-memory store, used when no database is configured or it fails to open
#[derive(Default)]
pub struct InMemoryStore {
    collections: Mutex<HashMap<Collection, Vec<StoredEntry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn append(&self, collection: Collection, body: serde_json::Value) -> AppResult<String> {
        let mut collections = self.collections.lock()
            .map_err(|e| AppError::Storage(format!("Mutex poisoned: {}", e)))?;
        let id = Uuid::new_v4().to_string();
        collections
            .entry(collection)
            .or_default()
            .push(StoredEntry { id: id.clone(), body });
        Ok(id)
    }

    async fn list(&self, collection: Collection) -> AppResult<Vec<StoredEntry>> {
        let collections = self.collections.lock()
            .map_err(|e| AppError::Storage(format!("Mutex poisoned: {}", e)))?;
        Ok(collections.get(&collection).cloned().unwrap_or_default())
    }

    async fn delete(&self, collection: Collection, id: &str) -> AppResult<()> {
        let mut collections = self.collections.lock()
            .map_err(|e| AppError::Storage(format!("Mutex poisoned: {}", e)))?;
        if let Some(entries) = collections.get_mut(&collection) {
            entries.retain(|entry| entry.id != id);
        }
        Ok(())
    }

    async fn put(&self, collection: Collection, id: &str, body: serde_json::Value) -> AppResult<()> {
        let mut collections = self.collections.lock()
            .map_err(|e| AppError::Storage(format!("Mutex poisoned: {}", e)))?;
        let entries = collections.entry(collection).or_default();
        match entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => entry.body = body,
            None => entries.push(StoredEntry { id: id.to_string(), body }),
        }
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> AppResult<Option<serde_json::Value>> {
        let collections = self.collections.lock()
            .map_err(|e| AppError::Storage(format!("Mutex poisoned: {}", e)))?;
        Ok(collections
            .get(&collection)
            .and_then(|entries| entries.iter().find(|entry| entry.id == id))
            .map(|entry| entry.body.clone()))
    }
}
