//! Linguistic analysis of saved translations

use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::providers::AnalysisProvider;
use crate::shared::emit::EventBus;
use crate::shared::error::{AppError, AppResult};
use crate::shared::events::WorkspaceEvent;
use crate::shared::types::{Notice, TranslationRecord};

pub struct AnalysisPanel {
    provider: Arc<dyn AnalysisProvider>,
    bus: EventBus,
    /// Record currently being analyzed; one at a time
    loading_id: Mutex<Option<String>>,
}

impl AnalysisPanel {
    pub fn new(provider: Arc<dyn AnalysisProvider>, bus: EventBus) -> Self {
        Self {
            provider,
            bus,
            loading_id: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        match self.loading_id.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn loading_id(&self) -> Option<String> {
        self.lock().clone()
    }

    pub async fn analyze_record(&self, record: &TranslationRecord) -> AppResult<String> {
        {
            let mut loading = self.lock();
            if loading.as_deref() == Some(record.id.as_str()) {
                return Err(AppError::Validation(format!(
                    "Analysis already running for {}",
                    record.id
                )));
            }
            *loading = Some(record.id.clone());
        }

        let texts = vec![record.source_text.clone(), record.target_text.clone()];
        let result = self.run(Some(record.id.clone()), &texts).await;

        {
            let mut loading = self.lock();
            if loading.as_deref() == Some(record.id.as_str()) {
                *loading = None;
            }
        }
        result
    }

    /// Analyze the source and target text of every record in one request
    pub async fn analyze_batch(&self, records: &[TranslationRecord]) -> AppResult<String> {
        if records.is_empty() {
            return Err(AppError::Validation("No translations to analyze".to_string()));
        }

        let texts: Vec<String> = records
            .iter()
            .flat_map(|r| [r.source_text.clone(), r.target_text.clone()])
            .collect();
        self.run(None, &texts).await
    }

    async fn run(&self, record_id: Option<String>, texts: &[String]) -> AppResult<String> {
        tracing::info!("[Analysis] Analyzing {} texts", texts.len());
        match self.provider.analyze(texts).await {
            Ok(content) => {
                self.bus.emit(WorkspaceEvent::AnalysisReady {
                    record_id,
                    content: content.clone(),
                });
                Ok(content)
            }
            Err(e) => {
                tracing::error!("[Analysis] Failed: {}", e);
                self.bus.notify(Notice::error(format!("Analysis failed: {}", e)));
                Err(e)
            }
        }
    }
}
