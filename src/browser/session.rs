use crate::browser::orchestrator::FetchOrchestrator;
use crate::core::TextGenerator;
use crate::merge::Merger;
use crate::types::MergedView;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Fetches pages and turns them into numbered text views.
///
/// Nothing is remembered between navigations; each call fetches both
/// sources again and merges from scratch.
pub struct PageSession {
    orchestrator: FetchOrchestrator,
    merger: Merger,
    advisor: Option<Arc<dyn TextGenerator>>,
}

impl PageSession {
    pub fn new(orchestrator: FetchOrchestrator, merger: Merger) -> Self {
        Self {
            orchestrator,
            merger,
            advisor: None,
        }
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn TextGenerator>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn has_advisor(&self) -> bool {
        self.advisor.is_some()
    }

    pub fn advisor_name(&self) -> Option<&str> {
        self.advisor.as_deref().map(|a| a.name())
    }

    pub async fn navigate(&self, url: &str) -> MergedView {
        let request_id = Uuid::new_v4();
        let span = info_span!("navigate", url, %request_id);

        async move {
            info!("fetching page");
            let (text, snapshot) = self.orchestrator.fetch(url).await;

            if let Some(err) = text.error.as_ref().filter(|_| !text.success) {
                warn!(error = %err, "text leg failed");
            }
            if let Some(err) = snapshot.error.as_ref().filter(|_| !snapshot.success) {
                warn!(error = %err, "snapshot leg failed");
            }

            let view = self
                .merger
                .merge(&text, &snapshot, self.advisor.as_deref())
                .await;

            info!(
                success = view.success,
                elements = view.mapping.len(),
                warnings = view.warnings.len(),
                "page ready"
            );
            view
        }
        .instrument(span)
        .await
    }
}

#[cfg(feature = "chrome")]
impl PageSession {
    /// Lynx for text, headless Chrome for the snapshot, and the configured
    /// LLM as advisor unless it is disabled or cannot be built.
    pub fn from_config(config: &crate::core::Config) -> Self {
        use crate::browser::{ChromeSnapshotFetcher, LynxTextFetcher};
        use crate::llm::create_llm_manager;

        let orchestrator = FetchOrchestrator::new(
            Arc::new(LynxTextFetcher::new(config.engine.lynx_path.clone())),
            Arc::new(ChromeSnapshotFetcher::from_config(&config.engine)),
            config.engine.clone(),
        )
        .with_width(config.display.width);

        let merger = Merger::new(config.merge.clone())
            .with_sampling(config.llm.temperature, config.llm.max_tokens);

        let session = Self::new(orchestrator, merger);
        if !config.llm.enabled {
            info!("LLM advisor disabled by configuration");
            return session;
        }

        match create_llm_manager(&config.llm) {
            Ok(manager) => session.with_advisor(Arc::new(manager)),
            Err(e) => {
                warn!(error = %e, "LLM advisor unavailable, continuing without it");
                session
            }
        }
    }

    pub fn quick_start() -> Self {
        Self::from_config(&crate::core::Config::default())
    }
}
