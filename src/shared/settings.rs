use serde::{Deserialize, Serialize};
use ts_rs::TS;
use tokio::fs;
use std::path::{Path, PathBuf};
use directories::ProjectDirs;
use keyring::Entry;

use super::error::{AppError, AppResult};
use super::types::ProfilePreferences;

const KEYRING_SERVICE: &str = "translation-workspace";

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export, export_to = "workspace/")]
pub struct WorkspaceSettings {
    pub api_keys: ApiKeys,
    pub endpoints: Endpoints,
    pub preferences: UserPreferences,
    pub storage: StorageSettings,
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export, export_to = "workspace/")]
pub struct ApiKeys {
    pub deepl: String,
    pub gemini: String,
    pub firebase: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyKind {
    DeepL,
    Gemini,
    Firebase,
}

impl ApiKeyKind {
    fn env_var(self) -> &'static str {
        match self {
            ApiKeyKind::DeepL => "DEEPL_API_KEY",
            ApiKeyKind::Gemini => "GEMINI_API_KEY",
            ApiKeyKind::Firebase => "FIREBASE_API_KEY",
        }
    }

    fn keyring_account(self) -> &'static str {
        match self {
            ApiKeyKind::DeepL => "deepl_api_key",
            ApiKeyKind::Gemini => "gemini_api_key",
            ApiKeyKind::Firebase => "firebase_api_key",
        }
    }
}

impl ApiKeys {
    fn configured(&self, kind: ApiKeyKind) -> &str {
        match kind {
            ApiKeyKind::DeepL => &self.deepl,
            ApiKeyKind::Gemini => &self.gemini,
            ApiKeyKind::Firebase => &self.firebase,
        }
    }

    /// Settings value first, then the OS keyring
    pub fn resolve(&self, kind: ApiKeyKind) -> AppResult<String> {
        let configured = self.configured(kind).trim();
        if !configured.is_empty() {
            return Ok(configured.to_string());
        }

        let entry = Entry::new(KEYRING_SERVICE, kind.keyring_account())
            .map_err(|e| AppError::Config(e.to_string()))?;
        match entry.get_password() {
            Ok(p) if !p.trim().is_empty() => Ok(p),
            Ok(_) => Err(AppError::Validation("Missing API Key".to_string())),
            Err(keyring::Error::NoEntry) => Err(AppError::Validation("Missing API Key".to_string())),
            Err(err) => Err(AppError::Config(err.to_string())),
        }
    }

}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export, export_to = "workspace/")]
pub struct Endpoints {
    pub deepl_url: String,
    pub gemini_url: String,
    pub gemini_model: String,
    pub identity_url: String,
    /// Realtime Database root, e.g. https://<project>.firebaseio.com
    pub database_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            deepl_url: "https://api-free.deepl.com/v2/translate".to_string(),
            gemini_url: "https://generativelanguage.googleapis.com".to_string(),
            gemini_model: "gemini-2.5-flash".to_string(),
            identity_url: "https://identitytoolkit.googleapis.com".to_string(),
            database_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export, export_to = "workspace/")]
pub struct UserPreferences {
    pub default_source_lang: String,
    pub default_target_lang: String,
    /// Quiet period before an auto-translate fires
    #[ts(type = "number")]
    pub debounce_ms: u64,
    pub retranslate_on_swap: bool,
    /// Language the analysis commentary is written in
    pub analysis_language: String,
    pub theme: String,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            default_source_lang: "EN".to_string(),
            default_target_lang: "TR".to_string(),
            debounce_ms: 1500,
            retranslate_on_swap: false,
            analysis_language: "Turkish".to_string(),
            theme: "system".to_string(),
        }
    }
}

impl From<&UserPreferences> for ProfilePreferences {
    fn from(prefs: &UserPreferences) -> Self {
        Self {
            theme: prefs.theme.clone(),
            default_source_lang: prefs.default_source_lang.clone(),
            default_target_lang: prefs.default_target_lang.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "workspace/")]
pub enum StorageBackend {
    #[default]
    Redb,
    Memory,
    Firebase,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export, export_to = "workspace/")]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Overrides the redb file location
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export, export_to = "workspace/")]
pub struct HttpSettings {
    #[ts(type = "number")]
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

fn project_dirs() -> AppResult<ProjectDirs> {
    ProjectDirs::from("com", "antigravity", "translation-workspace")
        .ok_or_else(|| AppError::Config("Failed to determine config directory".to_string()))
}

impl WorkspaceSettings {
    pub fn get_settings_path() -> AppResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("settings.json"))
    }

    /// Default location of the local redb store
    pub fn data_path(&self) -> AppResult<PathBuf> {
        match &self.storage.path {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(project_dirs()?.data_dir().join("workspace.redb")),
        }
    }

    /// Load from the per-user config directory, creating defaults on first run
    pub async fn load() -> AppResult<Self> {
        let path = Self::get_settings_path()?;
        Self::load_from(&path).await
    }

    pub async fn load_from(path: &Path) -> AppResult<Self> {
        let mut settings = if !path.exists() {
            let settings = Self::default();
            settings.save_to(path).await?;
            tracing::info!("[Settings] Created default settings at {}", path.display());
            settings
        } else {
            let content = fs::read_to_string(path).await
                .map_err(|e| AppError::Config(format!("Failed to read settings file: {}", e)))?;
            serde_json::from_str(&content)
                .map_err(|e| AppError::Config(format!("Failed to parse settings: {}", e)))?
        };

        settings.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Environment wins over the file for credentials and the database URL
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(ApiKeyKind::DeepL.env_var()) {
            self.api_keys.deepl = key;
        }
        if let Some(key) = non_empty(ApiKeyKind::Gemini.env_var()) {
            self.api_keys.gemini = key;
        }
        if let Some(key) = non_empty(ApiKeyKind::Firebase.env_var()) {
            self.api_keys.firebase = key;
        }
        if let Some(url) = non_empty("FIREBASE_DATABASE_URL") {
            self.endpoints.database_url = url;
        }
    }

    pub async fn save(&self) -> AppResult<()> {
        let path = Self::get_settings_path()?;
        self.save_to(&path).await
    }

    pub async fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await
                .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize settings: {}", e)))?;

        fs::write(path, content).await
            .map_err(|e| AppError::Config(format!("Failed to write settings file: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = WorkspaceSettings::load_from(&path).await.unwrap();

        assert!(path.exists());
        assert_eq!(settings.preferences.debounce_ms, 1500);
        assert_eq!(settings.preferences.default_source_lang, "EN");
        assert_eq!(settings.preferences.default_target_lang, "TR");
        assert_eq!(settings.storage.backend, StorageBackend::Redb);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, r#"{"preferences":{"debounce_ms":300},"storage":{"backend":"memory"}}"#)
            .await
            .unwrap();

        let settings = WorkspaceSettings::load_from(&path).await.unwrap();
        assert_eq!(settings.preferences.debounce_ms, 300);
        assert_eq!(settings.preferences.default_target_lang, "TR");
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
        assert_eq!(settings.http.timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let err = WorkspaceSettings::load_from(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_env_overrides_ignore_blank_values() {
        let mut settings = WorkspaceSettings::default();
        settings.api_keys.deepl = "from-file".to_string();

        settings.apply_env_overrides(|key| match key {
            "DEEPL_API_KEY" => Some("  ".to_string()),
            "GEMINI_API_KEY" => Some("gem".to_string()),
            "FIREBASE_DATABASE_URL" => Some("https://demo.firebaseio.com".to_string()),
            _ => None,
        });

        assert_eq!(settings.api_keys.deepl, "from-file");
        assert_eq!(settings.api_keys.gemini, "gem");
        assert_eq!(settings.endpoints.database_url, "https://demo.firebaseio.com");
    }

    #[test]
    fn test_resolve_prefers_configured_key() {
        let keys = ApiKeys { deepl: " abc ".to_string(), ..Default::default() };
        assert_eq!(keys.resolve(ApiKeyKind::DeepL).unwrap(), "abc");
    }

    #[test]
    fn test_profile_defaults_follow_preferences() {
        let prefs = UserPreferences {
            theme: "dark".to_string(),
            default_target_lang: "DE".to_string(),
            ..Default::default()
        };
        let defaults = ProfilePreferences::from(&prefs);
        assert_eq!(defaults.theme, "dark");
        assert_eq!(defaults.default_source_lang, "EN");
        assert_eq!(defaults.default_target_lang, "DE");
    }
}
