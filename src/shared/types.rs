use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use super::error::{AppError, AppResult};

/// Upper-case ISO 639-1 language code as used by the translation provider ("EN", "TR").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    /// Parse a code case-insensitively, rejecting anything that is not ISO 639-1
    pub fn parse(code: &str) -> AppResult<Self> {
        let lower = code.trim().to_ascii_lowercase();
        isolang::Language::from_639_1(&lower)
            .ok_or_else(|| AppError::Validation(format!("Invalid language: {}", code)))?;
        Ok(Self(lower.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn language(&self) -> Option<isolang::Language> {
        isolang::Language::from_639_1(&self.0.to_ascii_lowercase())
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LanguageCode> for String {
    fn from(code: LanguageCode) -> Self {
        code.0
    }
}

/// One debounced translation attempt. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    pub text: String,
    pub source_lang: LanguageCode,
    pub target_lang: LanguageCode,
    pub request_id: u64,
}

/// Successful provider output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "workspace/")]
pub struct TranslationOutput {
    pub translated: String,
    pub detected_source_lang: Option<String>,
}

/// Translation history entry. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "workspace/")]
pub struct TranslationRecord {
    /// Store-assigned key; not part of the stored body
    #[serde(skip)]
    pub id: String,
    pub source_text: String,
    pub target_text: String,
    #[ts(type = "string")]
    pub source_language: LanguageCode,
    #[ts(type = "string")]
    pub target_language: LanguageCode,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
}

impl TranslationRecord {
    /// Build a not-yet-stored record stamped with the current time
    pub fn new(
        source_text: impl Into<String>,
        target_text: impl Into<String>,
        source_language: LanguageCode,
        target_language: LanguageCode,
    ) -> Self {
        Self {
            id: String::new(),
            source_text: source_text.into(),
            target_text: target_text.into(),
            source_language,
            target_language,
            timestamp: Utc::now(),
        }
    }
}

/// Saved editor document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "workspace/")]
pub struct DocumentRecord {
    #[serde(skip)]
    pub id: String,
    pub title: String,
    pub content: String,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub char_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "workspace/")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Transient user notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "workspace/")]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

/// Snapshot of a translate editor surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "workspace/")]
pub struct EditorSnapshot {
    #[ts(type = "string")]
    pub source_lang: LanguageCode,
    #[ts(type = "string")]
    pub target_lang: LanguageCode,
    pub source_text: String,
    pub target_text: String,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "workspace/")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Workspace defaults stored with a user's profile record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "workspace/")]
pub struct ProfilePreferences {
    pub theme: String,
    pub default_source_lang: String,
    pub default_target_lang: String,
}

/// Stored account profile, keyed by uid in the users collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "workspace/")]
pub struct UserRecord {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub last_login: DateTime<Utc>,
    #[serde(default)]
    pub preferences: ProfilePreferences,
}

/// Authenticated user plus provider tokens. Tokens never leave the core.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSession {
    pub profile: UserProfile,
    pub id_token: String,
    pub refresh_token: String,
}

/// Word/character statistics for a document body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "workspace/")]
pub struct TextStats {
    pub word_count: usize,
    pub char_count: usize,
    pub grapheme_count: usize,
}
