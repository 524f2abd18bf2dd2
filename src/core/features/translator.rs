//! Translator feature
//!
//! Debounced auto-translate for one editing surface. Keystrokes are coalesced
//! into a single provider call per pause in typing, and only the most recently
//! issued request may display or persist its result.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::core::history::TranslationHistory;
use crate::core::providers::TranslationProvider;
use crate::shared::emit::EventBus;
use crate::shared::events::WorkspaceEvent;
use crate::shared::types::{EditorSnapshot, LanguageCode, Notice, TranslationRecord, TranslationRequest};

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct TranslatorOptions {
    pub quiet_period: Duration,
    /// Whether swapping languages schedules a fresh translation
    pub retranslate_on_swap: bool,
}

impl Default for TranslatorOptions {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
            retranslate_on_swap: false,
        }
    }
}

struct EditorState {
    source_lang: LanguageCode,
    target_lang: LanguageCode,
    source_text: String,
    target_text: String,
    loading: bool,
    latest_request_id: u64,
    pending_timer: Option<JoinHandle<()>>,
}

impl EditorState {
    fn cancel_pending(&mut self) {
        if let Some(timer) = self.pending_timer.take() {
            timer.abort();
        }
    }

    fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            source_lang: self.source_lang.clone(),
            target_lang: self.target_lang.clone(),
            source_text: self.source_text.clone(),
            target_text: self.target_text.clone(),
            loading: self.loading,
        }
    }
}

struct Inner {
    provider: Arc<dyn TranslationProvider>,
    history: Arc<TranslationHistory>,
    bus: EventBus,
    options: TranslatorOptions,
    state: Mutex<EditorState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, EditorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("[Translator] State mutex poisoned, recovering...");
                poisoned.into_inner()
            }
        }
    }
}

/// Debounced translate coordinator. Cheap to clone; clones share one surface.
#[derive(Clone)]
pub struct TranslateCoordinator {
    inner: Arc<Inner>,
}

impl TranslateCoordinator {
    pub fn new(
        provider: Arc<dyn TranslationProvider>,
        history: Arc<TranslationHistory>,
        bus: EventBus,
        source_lang: LanguageCode,
        target_lang: LanguageCode,
        options: TranslatorOptions,
    ) -> Self {
        let state = EditorState {
            source_lang,
            target_lang,
            source_text: String::new(),
            target_text: String::new(),
            loading: false,
            latest_request_id: 0,
            pending_timer: None,
        };
        Self {
            inner: Arc::new(Inner {
                provider,
                history,
                bus,
                options,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn latest_request_id(&self) -> u64 {
        self.inner.lock().latest_request_id
    }

    /// React to an edit of the source text. Must be called inside a tokio runtime.
    pub fn on_text_changed(&self, text: impl Into<String>, source_lang: LanguageCode, target_lang: LanguageCode) {
        let text = text.into();
        let mut state = self.inner.lock();
        state.source_text = text.clone();
        state.source_lang = source_lang.clone();
        state.target_lang = target_lang.clone();
        self.schedule_locked(&mut state, text, source_lang, target_lang);
    }

    pub fn set_source_text(&self, text: impl Into<String>) {
        let (source, target) = self.languages();
        self.on_text_changed(text, source, target);
    }

    /// Changing a language re-runs the current text through the debounce
    pub fn set_source_language(&self, lang: LanguageCode) {
        let (text, _, target) = self.current_input();
        self.on_text_changed(text, lang, target);
    }

    pub fn set_target_language(&self, lang: LanguageCode) {
        let (text, source, _) = self.current_input();
        self.on_text_changed(text, source, lang);
    }

    /// Exchange languages and texts in one step.
    ///
    /// Cancels the pending timer and invalidates in-flight requests; only
    /// schedules a new translation when `retranslate_on_swap` is set.
    pub fn swap_languages(&self) {
        let mut state = self.inner.lock();
        let st = &mut *state;
        std::mem::swap(&mut st.source_lang, &mut st.target_lang);
        std::mem::swap(&mut st.source_text, &mut st.target_text);
        st.cancel_pending();
        st.latest_request_id += 1;
        let was_loading = std::mem::replace(&mut st.loading, false);
        tracing::debug!("[Translator] Swapped to {} -> {}", st.source_lang, st.target_lang);

        self.inner.bus.emit(WorkspaceEvent::LanguagesSwapped);
        if was_loading {
            self.inner.bus.emit(WorkspaceEvent::LoadingChanged(false));
        }

        if self.inner.options.retranslate_on_swap {
            let text = state.source_text.clone();
            let source = state.source_lang.clone();
            let target = state.target_lang.clone();
            self.schedule_locked(&mut state, text, source, target);
        }
    }

    fn languages(&self) -> (LanguageCode, LanguageCode) {
        let state = self.inner.lock();
        (state.source_lang.clone(), state.target_lang.clone())
    }

    fn current_input(&self) -> (String, LanguageCode, LanguageCode) {
        let state = self.inner.lock();
        (state.source_text.clone(), state.source_lang.clone(), state.target_lang.clone())
    }

    fn schedule_locked(
        &self,
        state: &mut EditorState,
        text: String,
        source_lang: LanguageCode,
        target_lang: LanguageCode,
    ) {
        state.cancel_pending();

        if text.trim().is_empty() {
            // Invalidate anything in flight so a late response cannot refill the target
            state.latest_request_id += 1;
            state.target_text.clear();
            let was_loading = std::mem::replace(&mut state.loading, false);
            self.inner.bus.emit(WorkspaceEvent::TargetCleared);
            if was_loading {
                self.inner.bus.emit(WorkspaceEvent::LoadingChanged(false));
            }
            return;
        }

        state.latest_request_id += 1;
        let request = TranslationRequest {
            text,
            source_lang,
            target_lang,
            request_id: state.latest_request_id,
        };

        let coordinator = self.clone();
        let quiet_period = self.inner.options.quiet_period;
        state.pending_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            // Execution runs detached: superseding only aborts the timer, never the request
            tokio::spawn(async move {
                coordinator.execute_translate(request).await;
            });
        }));
    }

    /// Run one translation and apply it only if it is still the latest request
    pub async fn execute_translate(&self, request: TranslationRequest) {
        {
            let mut state = self.inner.lock();
            // Superseded between the timer firing and this task starting
            if state.latest_request_id != request.request_id {
                return;
            }
            state.loading = true;
        }
        self.inner.bus.emit(WorkspaceEvent::LoadingChanged(true));
        tracing::debug!(
            "[Translator] Request #{} {} -> {}",
            request.request_id,
            request.source_lang,
            request.target_lang
        );

        let result = self
            .inner
            .provider
            .translate(&request.text, &request.source_lang, &request.target_lang)
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                tracing::error!("[Translator] Request #{} failed: {}", request.request_id, e);
                self.inner.bus.notify(Notice::error(e.to_string()));
                self.clear_loading_if_latest(request.request_id);
                return;
            }
        };

        {
            let mut state = self.inner.lock();
            if state.latest_request_id != request.request_id {
                tracing::debug!(
                    "[Translator] Dropping stale result #{} (latest #{})",
                    request.request_id,
                    state.latest_request_id
                );
                return;
            }
            state.target_text = output.translated.clone();
        }
        self.inner.bus.emit(WorkspaceEvent::TranslationUpdated {
            request_id: request.request_id,
            target_text: output.translated.clone(),
        });

        let record = TranslationRecord::new(
            request.text,
            output.translated,
            request.source_lang,
            request.target_lang,
        );
        if let Err(e) = self.inner.history.append(&record).await {
            tracing::error!("[Translator] Failed to save translation: {}", e);
            self.inner.bus.notify(Notice::error(format!("Failed to save translation: {}", e)));
        }

        self.clear_loading_if_latest(request.request_id);
    }

    fn clear_loading_if_latest(&self, request_id: u64) {
        let cleared = {
            let mut state = self.inner.lock();
            if state.latest_request_id == request_id && state.loading {
                state.loading = false;
                true
            } else {
                false
            }
        };
        if cleared {
            self.inner.bus.emit(WorkspaceEvent::LoadingChanged(false));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::InMemoryStore;
    use crate::shared::emit::drain_events;
    use crate::shared::error::{AppError, AppResult};
    use crate::shared::types::{NoticeLevel, TranslationOutput};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Provider that answers "<text>@<target>" after a per-text delay
    #[derive(Default)]
    struct ScriptedProvider {
        delays: HashMap<String, Duration>,
        failing: bool,
        failing_texts: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TranslationProvider for ScriptedProvider {
        async fn translate(
            &self,
            text: &str,
            _source: &LanguageCode,
            target: &LanguageCode,
        ) -> AppResult<TranslationOutput> {
            self.calls.lock().unwrap().push(text.to_string());
            if let Some(delay) = self.delays.get(text) {
                tokio::time::sleep(*delay).await;
            }
            if self.failing || self.failing_texts.iter().any(|t| t == text) {
                return Err(AppError::provider_status(456, "Quota exceeded"));
            }
            Ok(TranslationOutput {
                translated: format!("{}@{}", text, target),
                detected_source_lang: None,
            })
        }
    }

    fn lang(code: &str) -> LanguageCode {
        LanguageCode::parse(code).unwrap()
    }

    fn setup(provider: ScriptedProvider) -> (TranslateCoordinator, Arc<ScriptedProvider>, Arc<TranslationHistory>, EventBus) {
        let bus = EventBus::new();
        let provider = Arc::new(provider);
        let history = Arc::new(TranslationHistory::new(Arc::new(InMemoryStore::new()), bus.clone()));
        let coordinator = TranslateCoordinator::new(
            provider.clone(),
            history.clone(),
            bus.clone(),
            lang("EN"),
            lang("TR"),
            TranslatorOptions::default(),
        );
        (coordinator, provider, history, bus)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_fire_one_request_with_last_text() {
        let (coordinator, provider, history, _bus) = setup(ScriptedProvider::default());

        for text in ["h", "he", "hel", "hello"] {
            coordinator.on_text_changed(text, lang("EN"), lang("TR"));
            tokio::time::sleep(Duration::from_millis(400)).await;
        }
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(*provider.calls.lock().unwrap(), vec!["hello".to_string()]);
        assert_eq!(coordinator.snapshot().target_text, "hello@TR");
        assert_eq!(history.current().len(), 1);
        assert_eq!(coordinator.latest_request_id(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_fires_before_quiet_period() {
        let (coordinator, provider, _history, _bus) = setup(ScriptedProvider::default());

        coordinator.on_text_changed("hello", lang("EN"), lang("TR"));
        tokio::time::sleep(Duration::from_millis(1400)).await;
        assert!(provider.calls.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(provider.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_never_displayed_or_persisted() {
        let mut provider = ScriptedProvider::default();
        provider.delays.insert("first".into(), Duration::from_secs(5));
        provider.delays.insert("second".into(), Duration::from_secs(1));
        let (coordinator, provider, history, bus) = setup(provider);
        let mut events = bus.subscribe();

        // Request #1 goes out and stays in flight for 5s
        coordinator.on_text_changed("first", lang("EN"), lang("TR"));
        tokio::time::sleep(Duration::from_millis(1600)).await;
        // Request #2 is issued before #1 answers, and answers first
        coordinator.on_text_changed("second", lang("EN"), lang("TR"));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(provider.calls.lock().unwrap().len(), 2);
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.target_text, "second@TR");
        assert!(!snapshot.loading);

        let records = history.current();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source_text, "second");
        assert_eq!(records[0].target_text, "second@TR");

        let shown: Vec<_> = drain_events(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                WorkspaceEvent::TranslationUpdated { request_id, target_text } => Some((request_id, target_text)),
                _ => None,
            })
            .collect();
        assert_eq!(shown, vec![(2, "second@TR".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_text_clears_without_request() {
        let (coordinator, provider, _history, bus) = setup(ScriptedProvider::default());
        coordinator.on_text_changed("hi", lang("EN"), lang("TR"));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(coordinator.snapshot().target_text, "hi@TR");

        let mut events = bus.subscribe();
        coordinator.on_text_changed("   ", lang("EN"), lang("TR"));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(provider.calls.lock().unwrap().len(), 1);
        assert_eq!(coordinator.snapshot().target_text, "");
        assert!(drain_events(&mut events).contains(&WorkspaceEvent::TargetCleared));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_text_cancels_pending_timer() {
        let (coordinator, provider, history, _bus) = setup(ScriptedProvider::default());
        coordinator.on_text_changed("hello", lang("EN"), lang("TR"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        coordinator.on_text_changed("", lang("EN"), lang("TR"));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(provider.calls.lock().unwrap().is_empty());
        assert!(history.current().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_error_notifies_once_and_persists_nothing() {
        let provider = ScriptedProvider { failing: true, ..Default::default() };
        let (coordinator, _provider, history, bus) = setup(provider);
        let mut events = bus.subscribe();

        coordinator.on_text_changed("hello", lang("EN"), lang("TR"));
        tokio::time::sleep(Duration::from_secs(3)).await;

        let events = drain_events(&mut events);
        let errors: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, WorkspaceEvent::Notification(n) if n.level == NoticeLevel::Error))
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(history.current().is_empty());
        assert!(!coordinator.snapshot().loading);
        assert_eq!(events.last(), Some(&WorkspaceEvent::LoadingChanged(false)));
        assert_eq!(coordinator.snapshot().target_text, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_after_error_issues_fresh_request() {
        let provider = ScriptedProvider { failing: true, ..Default::default() };
        let (coordinator, provider, _history, _bus) = setup(provider);

        coordinator.on_text_changed("hello", lang("EN"), lang("TR"));
        tokio::time::sleep(Duration::from_secs(2)).await;
        coordinator.on_text_changed("hello!", lang("EN"), lang("TR"));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(provider.calls.lock().unwrap().len(), 2);
        assert_eq!(coordinator.latest_request_id(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_languages_exchanges_state() {
        let (coordinator, provider, _history, _bus) = setup(ScriptedProvider::default());
        {
            let mut state = coordinator.inner.lock();
            state.source_text = "hi".to_string();
            state.target_text = "merhaba".to_string();
        }

        coordinator.swap_languages();

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.source_lang, lang("TR"));
        assert_eq!(snapshot.target_lang, lang("EN"));
        assert_eq!(snapshot.source_text, "merhaba");
        assert_eq!(snapshot.target_text, "hi");

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_drops_in_flight_result() {
        let mut provider = ScriptedProvider::default();
        provider.delays.insert("hi".into(), Duration::from_secs(2));
        let (coordinator, _provider, history, bus) = setup(provider);
        let mut events = bus.subscribe();

        coordinator.on_text_changed("hi", lang("EN"), lang("TR"));
        tokio::time::sleep(Duration::from_millis(1600)).await;
        coordinator.swap_languages();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.source_text, "");
        assert_eq!(snapshot.target_text, "hi");
        assert!(!snapshot.loading);
        assert!(history.current().is_empty());

        let loading: Vec<_> = drain_events(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                WorkspaceEvent::LoadingChanged(on) => Some(on),
                _ => None,
            })
            .collect();
        assert_eq!(loading, vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_failure_notifies_once_and_keeps_newer_loading() {
        let mut provider = ScriptedProvider::default();
        provider.delays.insert("first".into(), Duration::from_secs(2));
        provider.delays.insert("second".into(), Duration::from_secs(5));
        provider.failing_texts.push("first".into());
        let (coordinator, _provider, history, bus) = setup(provider);
        let mut events = bus.subscribe();

        // #1 fires at 1.5s and fails at 3.5s, while #2 (fired at 3.1s) is still in flight
        coordinator.on_text_changed("first", lang("EN"), lang("TR"));
        tokio::time::sleep(Duration::from_millis(1600)).await;
        coordinator.on_text_changed("second", lang("EN"), lang("TR"));
        tokio::time::sleep(Duration::from_millis(2400)).await;

        assert!(coordinator.snapshot().loading);
        let errors = drain_events(&mut events)
            .into_iter()
            .filter(|e| matches!(e, WorkspaceEvent::Notification(n) if n.level == NoticeLevel::Error))
            .count();
        assert_eq!(errors, 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        let snapshot = coordinator.snapshot();
        assert!(!snapshot.loading);
        assert_eq!(snapshot.target_text, "second@TR");
        assert_eq!(history.current().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_retranslates_when_enabled() {
        let bus = EventBus::new();
        let provider = Arc::new(ScriptedProvider::default());
        let history = Arc::new(TranslationHistory::new(Arc::new(InMemoryStore::new()), bus.clone()));
        let coordinator = TranslateCoordinator::new(
            provider.clone(),
            history,
            bus,
            lang("EN"),
            lang("TR"),
            TranslatorOptions { retranslate_on_swap: true, ..Default::default() },
        );

        coordinator.on_text_changed("hi", lang("EN"), lang("TR"));
        tokio::time::sleep(Duration::from_secs(2)).await;
        coordinator.swap_languages();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(*provider.calls.lock().unwrap(), vec!["hi".to_string(), "hi@TR".to_string()]);
        assert_eq!(coordinator.snapshot().target_text, "hi@TR@EN");
    }

    #[tokio::test(start_paused = true)]
    async fn test_language_change_retriggers() {
        let (coordinator, provider, _history, _bus) = setup(ScriptedProvider::default());
        coordinator.set_source_text("hallo");
        tokio::time::sleep(Duration::from_millis(500)).await;
        coordinator.set_source_language(lang("DE"));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(*provider.calls.lock().unwrap(), vec!["hallo".to_string()]);
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.source_lang, lang("DE"));
        assert_eq!(snapshot.target_text, "hallo@TR");
    }
}
