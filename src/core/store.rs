//! Record store seam
//!
//! The remote document store is an external collaborator; local adapters
//! (redb, in-memory) implement the same contract for offline use and tests.
//! Bodies are opaque JSON at this layer; typing happens in the history feeds.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::shared::error::AppResult;

pub mod firebase;
pub mod memory;
pub mod redb_store;

pub use firebase::FirebaseStore;
pub use memory::InMemoryStore;
pub use redb_store::RedbStore;

/// Named collections the workspace writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "workspace/")]
pub enum Collection {
    Translations,
    Documents,
    /// Per-account profile records keyed by uid
    Users,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Translations => "translations",
            Collection::Documents => "documents",
            Collection::Users => "users",
        }
    }
}

/// One stored record: store-assigned key plus its JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub id: String,
    pub body: serde_json::Value,
}

/// Append-only record store with delete-by-id
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a record, returning the key the store assigned
    async fn append(&self, collection: Collection, body: serde_json::Value) -> AppResult<String>;

    /// Full current contents of a collection, in no particular order
    async fn list(&self, collection: Collection) -> AppResult<Vec<StoredEntry>>;

    /// Remove a record. Removing an absent key succeeds.
    async fn delete(&self, collection: Collection, id: &str) -> AppResult<()>;

    /// Write a record under a caller-chosen key, replacing any existing body
    async fn put(&self, collection: Collection, id: &str, body: serde_json::Value) -> AppResult<()>;

    async fn get(&self, collection: Collection, id: &str) -> AppResult<Option<serde_json::Value>>;
}
