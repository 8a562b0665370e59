use crate::core::{EngineConfig, SnapshotFetcher, TextFetcher};
use crate::dom::SnapshotResult;
use crate::errors::{Leg, TextViewError};
use crate::types::TextResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn, Instrument, Span};

/// Runs the text and snapshot fetches side by side.
///
/// Each leg has its own timeout and both share one overall deadline. A leg
/// still running at the deadline is detached and its eventual result is
/// dropped. Neither leg's failure affects the other.
pub struct FetchOrchestrator {
    text: Arc<dyn TextFetcher>,
    snapshot: Arc<dyn SnapshotFetcher>,
    config: EngineConfig,
    width: usize,
}

impl FetchOrchestrator {
    pub fn new(
        text: Arc<dyn TextFetcher>,
        snapshot: Arc<dyn SnapshotFetcher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            text,
            snapshot,
            config,
            width: 80,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn fetch(&self, url: &str) -> (TextResult, SnapshotResult) {
        let overall = self.config.overall_timeout();
        let deadline = Instant::now() + overall;

        let text_leg = self.config.use_text_source.then(|| self.spawn_text(url));
        let snapshot_leg = self.spawn_snapshot(url);

        let text = match text_leg {
            Some(handle) => join_leg(handle, deadline, Leg::Text, overall, TextResult::failure).await,
            None => {
                debug!("text source disabled");
                TextResult::failure(TextViewError::unavailable(Leg::Text, "text source disabled"))
            }
        };
        let snapshot =
            join_leg(snapshot_leg, deadline, Leg::Snapshot, overall, SnapshotResult::failure).await;

        debug!(
            text_ok = text.success,
            snapshot_ok = snapshot.success,
            links = text.links.len(),
            elements = snapshot.elements.len(),
            "fetch legs finished"
        );
        (text, snapshot)
    }

    fn spawn_text(&self, url: &str) -> JoinHandle<TextResult> {
        let fetcher = Arc::clone(&self.text);
        let url = url.to_string();
        let width = self.width;
        let timeout = self.config.text_timeout();

        tokio::spawn(
            async move {
                match tokio::time::timeout(timeout, fetcher.fetch(&url, width, timeout)).await {
                    Ok(result) => result,
                    Err(_) => TextResult::failure(TextViewError::FetchTimeout {
                        leg: Leg::Text,
                        timeout,
                    }),
                }
            }
            .instrument(Span::current()),
        )
    }

    fn spawn_snapshot(&self, url: &str) -> JoinHandle<SnapshotResult> {
        let fetcher = Arc::clone(&self.snapshot);
        let url = url.to_string();
        let timeout = self.config.snapshot_timeout();

        tokio::spawn(
            async move {
                match tokio::time::timeout(timeout, fetcher.fetch(&url, timeout)).await {
                    Ok(result) => result,
                    Err(_) => SnapshotResult::failure(TextViewError::FetchTimeout {
                        leg: Leg::Snapshot,
                        timeout,
                    }),
                }
            }
            .instrument(Span::current()),
        )
    }
}

async fn join_leg<T>(
    handle: JoinHandle<T>,
    deadline: Instant,
    leg: Leg,
    overall: Duration,
    failed: fn(TextViewError) -> T,
) -> T {
    match tokio::time::timeout_at(deadline, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => {
            warn!(%leg, error = %join_err, "fetch leg panicked or was cancelled");
            failed(TextViewError::unavailable(leg, join_err))
        }
        Err(_) => {
            // dropping the handle detaches the task; a late result goes nowhere
            warn!(%leg, ?overall, "fetch leg missed the overall deadline, abandoning");
            failed(TextViewError::FetchTimeout {
                leg,
                timeout: overall,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixtures, StaticSnapshotFetcher, StaticTextFetcher};
    use std::sync::atomic::Ordering;

    fn engine(text_ms: u64, snapshot_ms: u64, overall_ms: u64) -> EngineConfig {
        EngineConfig {
            text_timeout_ms: text_ms,
            snapshot_timeout_ms: snapshot_ms,
            overall_timeout_ms: overall_ms,
            ..EngineConfig::default()
        }
    }

    fn page_text() -> TextResult {
        Fixtures::text("Hello [1]World", &[(1, "https://a.test/world")])
    }

    fn page_snapshot() -> SnapshotResult {
        Fixtures::snapshot(vec![Fixtures::link(0, "https://a.test/world", "World")])
    }

    #[tokio::test]
    async fn test_both_legs_succeed() {
        let text = StaticTextFetcher::new(page_text());
        let snapshot = StaticSnapshotFetcher::new(page_snapshot());
        let (text_calls, snapshot_calls) = (text.calls(), snapshot.calls());

        let orchestrator =
            FetchOrchestrator::new(Arc::new(text), Arc::new(snapshot), engine(1000, 1000, 2000));
        let (text, snapshot) = orchestrator.fetch("https://a.test/").await;

        assert_eq!(text, page_text());
        assert_eq!(snapshot, page_snapshot());
        assert_eq!(text_calls.load(Ordering::SeqCst), 1);
        assert_eq!(snapshot_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_leg_times_out_alone() {
        let text = StaticTextFetcher::new(page_text()).with_delay(Duration::from_secs(5));
        let snapshot = StaticSnapshotFetcher::new(page_snapshot());

        let orchestrator =
            FetchOrchestrator::new(Arc::new(text), Arc::new(snapshot), engine(50, 1000, 2000));
        let (text, snapshot) = orchestrator.fetch("https://a.test/").await;

        assert!(!text.success);
        assert_eq!(
            text.error,
            Some(TextViewError::FetchTimeout {
                leg: Leg::Text,
                timeout: Duration::from_millis(50)
            })
        );
        assert!(snapshot.success);
    }

    #[tokio::test]
    async fn test_overall_deadline_abandons_leg() {
        let text = StaticTextFetcher::new(page_text());
        let snapshot = StaticSnapshotFetcher::new(page_snapshot()).with_delay(Duration::from_secs(5));

        let orchestrator =
            FetchOrchestrator::new(Arc::new(text), Arc::new(snapshot), engine(10_000, 10_000, 100));
        let started = std::time::Instant::now();
        let (text, snapshot) = orchestrator.fetch("https://a.test/").await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(text.success);
        assert_eq!(
            snapshot.error,
            Some(TextViewError::FetchTimeout {
                leg: Leg::Snapshot,
                timeout: Duration::from_millis(100)
            })
        );
    }

    #[tokio::test]
    async fn test_failed_leg_does_not_cancel_other() {
        let failed = TextResult::failure(TextViewError::unavailable(Leg::Text, "lynx missing"));
        let text = StaticTextFetcher::new(failed.clone());
        let snapshot = StaticSnapshotFetcher::new(page_snapshot()).with_delay(Duration::from_millis(30));

        let orchestrator =
            FetchOrchestrator::new(Arc::new(text), Arc::new(snapshot), engine(1000, 1000, 2000));
        let (text, snapshot) = orchestrator.fetch("https://a.test/").await;

        assert_eq!(text, failed);
        assert!(snapshot.success);
        assert_eq!(snapshot.element_count(), 1);
    }

    #[tokio::test]
    async fn test_disabled_text_source_is_not_called() {
        let text = StaticTextFetcher::new(page_text());
        let calls = text.calls();
        let config = EngineConfig {
            use_text_source: false,
            ..engine(1000, 1000, 2000)
        };

        let orchestrator =
            FetchOrchestrator::new(Arc::new(text), Arc::new(StaticSnapshotFetcher::new(page_snapshot())), config);
        let (text, snapshot) = orchestrator.fetch("https://a.test/").await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            text.error,
            Some(TextViewError::FetchUnavailable { leg: Leg::Text, .. })
        ));
        assert!(snapshot.success);
    }
}
