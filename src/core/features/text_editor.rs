use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use unicode_segmentation::UnicodeSegmentation;

use crate::core::history::DocumentHistory;
use crate::shared::emit::EventBus;
use crate::shared::error::{AppError, AppResult};
use crate::shared::events::WorkspaceEvent;
use crate::shared::types::{DocumentRecord, Notice, TextStats};

/// Counts shown under the editor. Words are whitespace-separated tokens.
pub fn text_stats(content: &str) -> TextStats {
    let trimmed = content.trim();
    let word_count = if trimmed.is_empty() {
        0
    } else {
        trimmed.split_whitespace().count()
    };

    TextStats {
        word_count,
        char_count: content.chars().count(),
        grapheme_count: content.graphemes(true).count(),
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DocumentDraft {
    pub title: String,
    pub content: String,
    pub dirty: bool,
}

pub struct DocumentEditor {
    history: Arc<DocumentHistory>,
    bus: EventBus,
    draft: Mutex<DocumentDraft>,
}

impl DocumentEditor {
    pub fn new(history: Arc<DocumentHistory>, bus: EventBus) -> Self {
        Self {
            history,
            bus,
            draft: Mutex::new(DocumentDraft::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DocumentDraft> {
        match self.draft.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn draft(&self) -> DocumentDraft {
        self.lock().clone()
    }

    pub fn stats(&self) -> TextStats {
        text_stats(&self.lock().content)
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.lock().title = title.into();
    }

    pub fn set_content(&self, content: impl Into<String>) {
        let mut draft = self.lock();
        draft.content = content.into();
        if !draft.content.trim().is_empty() {
            draft.dirty = true;
        }
    }

    /// Replace the whole document, e.g. from a history entry
    pub fn load_external(&self, title: impl Into<String>, content: impl Into<String>) {
        let mut draft = self.lock();
        draft.title = title.into();
        draft.content = content.into();
        draft.dirty = true;
        tracing::debug!("[TextEditor] Loaded external text \"{}\"", draft.title);
    }

    /// Whether clearing would discard unsaved text
    pub fn needs_confirmation(&self) -> bool {
        let draft = self.lock();
        draft.dirty && (!draft.title.trim().is_empty() || !draft.content.trim().is_empty())
    }

    /// Returns whether the editor was cleared
    pub fn clear(&self, confirmed: bool) -> bool {
        if self.needs_confirmation() && !confirmed {
            return false;
        }
        *self.lock() = DocumentDraft::default();
        true
    }

    pub async fn save(&self) -> AppResult<String> {
        let draft = self.draft();

        if draft.content.trim().is_empty() {
            let err = AppError::Validation("content required".to_string());
            self.bus.notify(Notice::error(err.to_string()));
            return Err(err);
        }
        if draft.title.trim().is_empty() {
            let err = AppError::Validation("title required".to_string());
            self.bus.notify(Notice::error(err.to_string()));
            return Err(err);
        }

        let stats = text_stats(&draft.content);
        let record = DocumentRecord {
            id: String::new(),
            title: draft.title.clone(),
            content: draft.content.clone(),
            timestamp: Utc::now(),
            word_count: stats.word_count,
            char_count: stats.char_count,
        };

        match self.history.append(&record).await {
            Ok(id) => {
                {
                    // Edits made while the save was in flight keep the draft dirty
                    let mut current = self.lock();
                    if current.title == draft.title && current.content == draft.content {
                        current.dirty = false;
                    }
                }
                self.bus.notify(Notice::success("Document saved"));
                Ok(id)
            }
            Err(e) => {
                tracing::error!("[TextEditor] Save failed: {}", e);
                self.bus.notify(Notice::error("Failed to save document"));
                Err(e)
            }
        }
    }

    /// Feed `OpenInEditor` events from the bus into this editor
    pub fn listen(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let editor = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(WorkspaceEvent::OpenInEditor { title, content }) => {
                        editor.load_external(title, content);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("[TextEditor] Missed {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
