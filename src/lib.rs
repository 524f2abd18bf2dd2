// Module declarations
pub mod core;
pub mod shared;

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use crate::core::auth::{AuthSession, IdentityProvider, IdentityToolkit, TokenSink};
use crate::core::features::{AnalysisPanel, DocumentEditor, TranslateCoordinator, TranslatorOptions};
use crate::core::history::{DocumentHistory, TranslationHistory};
use crate::core::languages::parse_supported;
use crate::core::providers::{
    build_http_client, AnalysisProvider, DeepLProvider, GeminiProvider, TranslationProvider,
};
use crate::core::store::{FirebaseStore, InMemoryStore, RecordStore, RedbStore};
use crate::shared::settings::{ApiKeyKind, ApiKeys, StorageBackend, UserPreferences, WorkspaceSettings};
use crate::shared::types::{Notice, ProfilePreferences};

pub use crate::shared::{AppError, AppResult, EventBus};

/// Install the global subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call (tests, embedding shells) keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// External collaborators a workspace is assembled from
pub struct WorkspaceParts {
    pub store: Arc<dyn RecordStore>,
    pub translator: Arc<dyn TranslationProvider>,
    pub analysis: Arc<dyn AnalysisProvider>,
    pub identity: Arc<dyn IdentityProvider>,
    pub preferences: UserPreferences,
    pub token_sink: Option<TokenSink>,
}

/// One user's translation workspace: every surface wired to a shared bus
pub struct Workspace {
    pub bus: EventBus,
    pub translator: TranslateCoordinator,
    pub translations: Arc<TranslationHistory>,
    pub documents: Arc<DocumentHistory>,
    pub editor: Arc<DocumentEditor>,
    pub analysis: AnalysisPanel,
    pub auth: AuthSession,
    editor_listener: JoinHandle<()>,
}

fn resolve_key(keys: &ApiKeys, kind: ApiKeyKind) -> String {
    match keys.resolve(kind) {
        Ok(key) => key,
        Err(e) => {
            // Calls fail with "Missing API Key" until one is configured
            tracing::warn!("[Workspace] No {:?} key: {}", kind, e);
            String::new()
        }
    }
}

impl Workspace {
    /// Build the workspace described by `settings` and load both histories
    pub async fn open(settings: WorkspaceSettings) -> AppResult<Self> {
        let http = build_http_client(&settings.http)?;

        let mut firebase: Option<Arc<FirebaseStore>> = None;
        let store: Arc<dyn RecordStore> = match settings.storage.backend {
            StorageBackend::Memory => Arc::new(InMemoryStore::new()),
            StorageBackend::Redb => {
                let path = settings.data_path()?;
                match RedbStore::open(&path) {
                    Ok(store) => Arc::new(store),
                    Err(e) => {
                        tracing::error!("[Workspace] Failed to open database: {}. Falling back to in-memory.", e);
                        Arc::new(InMemoryStore::new())
                    }
                }
            }
            StorageBackend::Firebase => {
                let remote = Arc::new(FirebaseStore::new(http.clone(), settings.endpoints.database_url.clone())?);
                firebase = Some(remote.clone());
                remote
            }
        };

        let translator = Arc::new(DeepLProvider::new(
            http.clone(),
            settings.endpoints.deepl_url.clone(),
            resolve_key(&settings.api_keys, ApiKeyKind::DeepL),
        ));
        let analysis = Arc::new(GeminiProvider::new(
            http.clone(),
            settings.endpoints.gemini_url.clone(),
            settings.endpoints.gemini_model.clone(),
            resolve_key(&settings.api_keys, ApiKeyKind::Gemini),
            settings.preferences.analysis_language.clone(),
        ));
        let identity = Arc::new(IdentityToolkit::new(
            http,
            settings.endpoints.identity_url.clone(),
            resolve_key(&settings.api_keys, ApiKeyKind::Firebase),
        ));

        // Database reads and writes carry the signed-in user's token
        let token_sink: Option<TokenSink> = firebase.map(|remote| {
            Arc::new(move |token: Option<String>| remote.set_auth_token(token)) as TokenSink
        });

        let workspace = Self::from_parts(WorkspaceParts {
            store,
            translator,
            analysis,
            identity,
            preferences: settings.preferences,
            token_sink,
        })?;

        workspace.refresh().await;
        Ok(workspace)
    }

    /// Wire surfaces around the given collaborators. Must run inside a tokio runtime.
    pub fn from_parts(parts: WorkspaceParts) -> AppResult<Self> {
        let bus = EventBus::new();
        let prefs = parts.preferences;

        let translations = Arc::new(TranslationHistory::new(parts.store.clone(), bus.clone()));
        let documents = Arc::new(DocumentHistory::new(parts.store.clone(), bus.clone()));

        let translator = TranslateCoordinator::new(
            parts.translator,
            translations.clone(),
            bus.clone(),
            parse_supported(&prefs.default_source_lang)?,
            parse_supported(&prefs.default_target_lang)?,
            TranslatorOptions {
                quiet_period: std::time::Duration::from_millis(prefs.debounce_ms),
                retranslate_on_swap: prefs.retranslate_on_swap,
            },
        );

        let mut auth = AuthSession::new(parts.identity, bus.clone())
            .with_profile_store(parts.store, ProfilePreferences::from(&prefs));
        if let Some(sink) = parts.token_sink {
            auth = auth.with_token_sink(sink);
        }

        let editor = Arc::new(DocumentEditor::new(documents.clone(), bus.clone()));
        let editor_listener = editor.listen();

        tracing::info!(
            "[Workspace] Ready ({} -> {}, {}ms debounce)",
            prefs.default_source_lang,
            prefs.default_target_lang,
            prefs.debounce_ms
        );

        Ok(Self {
            analysis: AnalysisPanel::new(parts.analysis, bus.clone()),
            auth,
            bus,
            translator,
            translations,
            documents,
            editor,
            editor_listener,
        })
    }

    /// Reload both history feeds. Failures are reported as notices.
    pub async fn refresh(&self) {
        if let Err(e) = self.translations.refresh().await {
            tracing::error!("[Workspace] Failed to load translations: {}", e);
            self.bus.notify(Notice::error(e.to_string()));
        }
        if let Err(e) = self.documents.refresh().await {
            tracing::error!("[Workspace] Failed to load documents: {}", e);
            self.bus.notify(Notice::error(e.to_string()));
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.editor_listener.abort();
    }
}
