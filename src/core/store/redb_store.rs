use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition, TableError};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use super::{Collection, RecordStore, StoredEntry};
use crate::shared::error::{AppError, AppResult};

/// Key: store-assigned id, Value: serialized record body
const TRANSLATIONS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("translations");
const DOCUMENTS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("documents");
const USERS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("users");

fn table(collection: Collection) -> TableDefinition<'static, &'static str, &'static str> {
    match collection {
        Collection::Translations => TRANSLATIONS_TABLE,
        Collection::Documents => DOCUMENTS_TABLE,
        Collection::Users => USERS_TABLE,
    }
}

/// Embedded redb-backed store
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Storage(format!("Failed to create data directory: {}", e)))?;
        }

        let db = Database::create(path)
            .map_err(|e| AppError::Storage(format!("Failed to create database: {}", e)))?;

        // Initialize tables so reads never hit a missing table
        {
            let write_txn = db.begin_write()
                .map_err(|e| AppError::Storage(format!("Failed to begin write transaction: {}", e)))?;
            for collection in [Collection::Translations, Collection::Documents, Collection::Users] {
                write_txn.open_table(table(collection))
                    .map_err(|e| AppError::Storage(format!("Failed to open table: {}", e)))?;
            }
            write_txn.commit()
                .map_err(|e| AppError::Storage(format!("Failed to commit transaction: {}", e)))?;
        }

        tracing::info!("[RedbStore] Opened {}", path.display());
        Ok(Self { db: Arc::new(db) })
    }

    /// Run a transaction on the blocking pool so disk I/O stays off the runtime threads
    async fn blocking<R, F>(&self, op: F) -> AppResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&Database) -> AppResult<R> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| AppError::Storage(format!("Storage task failed: {}", e)))?
    }
}

fn write_entry(db: &Database, collection: Collection, id: &str, body: &str) -> AppResult<()> {
    let write_txn = db.begin_write()
        .map_err(|e| AppError::Storage(format!("Failed to begin write: {}", e)))?;
    {
        let mut table = write_txn.open_table(table(collection))
            .map_err(|e| AppError::Storage(format!("Failed to open table: {}", e)))?;
        table.insert(id, body)
            .map_err(|e| AppError::Storage(format!("Failed to insert: {}", e)))?;
    }
    write_txn.commit()
        .map_err(|e| AppError::Storage(format!("Failed to commit: {}", e)))
}

#[async_trait]
impl RecordStore for RedbStore {
    async fn append(&self, collection: Collection, body: serde_json::Value) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();
        let serialized = serde_json::to_string(&body)?;

        let key = id.clone();
        self.blocking(move |db| write_entry(db, collection, &key, &serialized))
            .await?;
        Ok(id)
    }

    async fn list(&self, collection: Collection) -> AppResult<Vec<StoredEntry>> {
        self.blocking(move |db| {
            let read_txn = db.begin_read()
                .map_err(|e| AppError::Storage(format!("Failed to begin read: {}", e)))?;

            let table = match read_txn.open_table(table(collection)) {
                Ok(table) => table,
                Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
                Err(e) => return Err(AppError::Storage(format!("Failed to open table: {}", e))),
            };

            let iter = table.iter()
                .map_err(|e| AppError::Storage(format!("Failed to create iterator: {}", e)))?;

            let mut entries = Vec::new();
            for entry in iter {
                let (key, value) = entry
                    .map_err(|e| AppError::Storage(format!("Failed to read entry: {}", e)))?;
                match serde_json::from_str(value.value()) {
                    Ok(body) => entries.push(StoredEntry { id: key.value().to_string(), body }),
                    Err(e) => tracing::warn!("[RedbStore] Skipping unreadable entry {}: {}", key.value(), e),
                }
            }
            Ok(entries)
        })
        .await
    }

    async fn delete(&self, collection: Collection, id: &str) -> AppResult<()> {
        let id = id.to_string();
        self.blocking(move |db| {
            let write_txn = db.begin_write()
                .map_err(|e| AppError::Storage(format!("Failed to begin write: {}", e)))?;
            {
                let mut table = write_txn.open_table(table(collection))
                    .map_err(|e| AppError::Storage(format!("Failed to open table: {}", e)))?;
                table.remove(id.as_str())
                    .map_err(|e| AppError::Storage(format!("Failed to remove key: {}", e)))?;
            }
            write_txn.commit()
                .map_err(|e| AppError::Storage(format!("Failed to commit: {}", e)))
        })
        .await
    }

    async fn put(&self, collection: Collection, id: &str, body: serde_json::Value) -> AppResult<()> {
        let id = id.to_string();
        let serialized = serde_json::to_string(&body)?;
        self.blocking(move |db| write_entry(db, collection, &id, &serialized))
            .await
    }

    async fn get(&self, collection: Collection, id: &str) -> AppResult<Option<serde_json::Value>> {
        let id = id.to_string();
        self.blocking(move |db| {
            let read_txn = db.begin_read()
                .map_err(|e| AppError::Storage(format!("Failed to begin read: {}", e)))?;
            let table = match read_txn.open_table(table(collection)) {
                Ok(table) => table,
                Err(TableError::TableDoesNotExist(_)) => return Ok(None),
                Err(e) => return Err(AppError::Storage(format!("Failed to open table: {}", e))),
            };

            let value = table.get(id.as_str())
                .map_err(|e| AppError::Storage(format!("Failed to read entry: {}", e)))?;
            match value {
                Some(value) => Ok(Some(serde_json::from_str(value.value())?)),
                None => Ok(None),
            }
        })
        .await
    }
}
