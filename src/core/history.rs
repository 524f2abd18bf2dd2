//! Live, typed history over a store collection
//!
//! Every mutation re-reads the whole collection and republishes it newest
//! first, the same way a realtime listener hands over a full snapshot.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use super::store::{Collection, RecordStore, StoredEntry};
use crate::shared::emit::EventBus;
use crate::shared::error::AppResult;
use crate::shared::events::WorkspaceEvent;
use crate::shared::types::{DocumentRecord, TranslationRecord};

/// A record type that lives in one store collection
pub trait HistoryRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn timestamp(&self) -> DateTime<Utc>;

    /// Event published with each fresh snapshot
    fn snapshot_event(records: Vec<Self>) -> WorkspaceEvent;
}

impl HistoryRecord for TranslationRecord {
    const COLLECTION: Collection = Collection::Translations;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn snapshot_event(records: Vec<Self>) -> WorkspaceEvent {
        WorkspaceEvent::TranslationsUpdated(records)
    }
}

impl HistoryRecord for DocumentRecord {
    const COLLECTION: Collection = Collection::Documents;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn snapshot_event(records: Vec<Self>) -> WorkspaceEvent {
        WorkspaceEvent::DocumentsUpdated(records)
    }
}

/// Newest first; ties fall back to id so the order is stable
pub fn sort_newest_first<T: HistoryRecord>(records: &mut [T]) {
    records.sort_by(|a, b| {
        b.timestamp()
            .cmp(&a.timestamp())
            .then_with(|| b.id().cmp(a.id()))
    });
}

fn parse_entries<T: HistoryRecord>(entries: Vec<StoredEntry>) -> Vec<T> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<T>(entry.body) {
            Ok(mut record) => {
                record.set_id(entry.id);
                Some(record)
            }
            Err(e) => {
                tracing::warn!("[History] Skipping malformed {} entry {}: {}", T::COLLECTION.name(), entry.id, e);
                None
            }
        })
        .collect()
}

pub struct HistoryFeed<T: HistoryRecord> {
    store: Arc<dyn RecordStore>,
    bus: EventBus,
    snapshot: watch::Sender<Vec<T>>,
    /// Sequence handed to each refresh before it reads the store
    issued: AtomicU64,
    /// Sequence of the snapshot currently published
    published: Mutex<u64>,
}

pub type TranslationHistory = HistoryFeed<TranslationRecord>;
pub type DocumentHistory = HistoryFeed<DocumentRecord>;

impl<T: HistoryRecord> HistoryFeed<T> {
    pub fn new(store: Arc<dyn RecordStore>, bus: EventBus) -> Self {
        let (snapshot, _) = watch::channel(Vec::new());
        Self {
            store,
            bus,
            snapshot,
            issued: AtomicU64::new(0),
            published: Mutex::new(0),
        }
    }

    /// Live view of the collection, always sorted newest first
    pub fn subscribe(&self) -> watch::Receiver<Vec<T>> {
        self.snapshot.subscribe()
    }

    pub fn current(&self) -> Vec<T> {
        self.snapshot.borrow().clone()
    }

    pub fn find(&self, id: &str) -> Option<T> {
        self.snapshot.borrow().iter().find(|r| r.id() == id).cloned()
    }

    /// Re-read the collection and publish it.
    ///
    /// Overlapping refreshes publish in the order they were issued: a read
    /// that finishes after a newer one has been published is discarded.
    pub async fn refresh(&self) -> AppResult<Vec<T>> {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let entries = self.store.list(T::COLLECTION).await?;
        let mut records = parse_entries::<T>(entries);
        sort_newest_first(&mut records);

        let mut published = match self.published.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if seq < *published {
            tracing::debug!(
                "[History] Discarding stale {} read #{} (published #{})",
                T::COLLECTION.name(),
                seq,
                *published
            );
            return Ok(self.current());
        }
        *published = seq;
        self.snapshot.send_replace(records.clone());
        self.bus.emit(T::snapshot_event(records.clone()));
        Ok(records)
    }

    /// Write a new record; the store assigns its id
    pub async fn append(&self, record: &T) -> AppResult<String> {
        let body = serde_json::to_value(record)?;
        let id = self.store.append(T::COLLECTION, body).await?;
        tracing::info!("[History] Added {} record {}", T::COLLECTION.name(), id);

        if let Err(e) = self.refresh().await {
            tracing::warn!("[History] Refresh after append failed: {}", e);
        }
        Ok(id)
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.store.delete(T::COLLECTION, id).await?;
        tracing::info!("[History] Deleted {} record {}", T::COLLECTION.name(), id);

        if let Err(e) = self.refresh().await {
            tracing::warn!("[History] Refresh after delete failed: {}", e);
        }
        Ok(())
    }
}

impl HistoryFeed<TranslationRecord> {
    /// Hand a translation to the document editor
    pub fn open_in_editor(&self, record: &TranslationRecord) {
        self.bus.emit(WorkspaceEvent::OpenInEditor {
            title: format!(
                "{} → {} translation",
                record.source_language, record.target_language
            ),
            content: record.target_text.clone(),
        });
    }
}

impl HistoryFeed<DocumentRecord> {
    /// Reopen a saved document in the editor
    pub fn open_in_editor(&self, record: &DocumentRecord) {
        self.bus.emit(WorkspaceEvent::OpenInEditor {
            title: record.title.clone(),
            content: record.content.clone(),
        });
    }
}
