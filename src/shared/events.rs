use serde::{Serialize, Deserialize};
use ts_rs::TS;
use super::types::{DocumentRecord, Notice, TranslationRecord, UserProfile};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "payload")] // Tagged enum for easier frontend parsing
#[ts(export, export_to = "workspace/")]
pub enum WorkspaceEvent {
    /// Accepted translation for the latest request
    #[serde(rename = "translator://translated")]
    TranslationUpdated { request_id: u64, target_text: String },

    #[serde(rename = "translator://cleared")]
    TargetCleared,

    #[serde(rename = "translator://loading")]
    LoadingChanged(bool),

    #[serde(rename = "translator://swapped")]
    LanguagesSwapped,

    #[serde(rename = "history://translations")]
    TranslationsUpdated(Vec<TranslationRecord>),

    #[serde(rename = "history://documents")]
    DocumentsUpdated(Vec<DocumentRecord>),

    /// Push text into the document editor
    #[serde(rename = "editor://open")]
    OpenInEditor { title: String, content: String },

    #[serde(rename = "analysis://ready")]
    AnalysisReady { record_id: Option<String>, content: String },

    #[serde(rename = "auth://changed")]
    AuthChanged(Option<UserProfile>),

    #[serde(rename = "notice://show")]
    Notification(Notice),
}
