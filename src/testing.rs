//! Deterministic stand-ins for the external capabilities, for tests and demos.

use crate::core::{Generation, GenerationRequest, LlmError, SnapshotFetcher, TextFetcher, TextGenerator};
use crate::dom::{ElementKind, SnapshotElement, SnapshotResult};
use crate::types::{MergedView, TextResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Text generator that always gives the same reply (or the same failure) and
/// records every prompt it was sent.
pub struct ScriptedGenerator {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            reply: Err(reason.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }

        match &self.reply {
            Ok(text) => Ok(Generation {
                text: text.clone(),
                tokens_used: None,
            }),
            Err(reason) => Err(LlmError::Unreachable {
                provider: "scripted".to_string(),
                reason: reason.clone(),
            }),
        }
    }
}

/// Text fetcher returning a fixed result after an optional delay.
pub struct StaticTextFetcher {
    result: TextResult,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl StaticTextFetcher {
    pub fn new(result: TextResult) -> Self {
        Self {
            result,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl TextFetcher for StaticTextFetcher {
    async fn fetch(&self, _url: &str, _width: usize, _timeout: Duration) -> TextResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

/// Snapshot fetcher returning a fixed result after an optional delay.
pub struct StaticSnapshotFetcher {
    result: SnapshotResult,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl StaticSnapshotFetcher {
    pub fn new(result: SnapshotResult) -> Self {
        Self {
            result,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl SnapshotFetcher for StaticSnapshotFetcher {
    async fn fetch(&self, _url: &str, _timeout: Duration) -> SnapshotResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

pub struct Fixtures;

impl Fixtures {
    pub fn link(index: usize, href: &str, label: &str) -> SnapshotElement {
        SnapshotElement::new(index, ElementKind::Link, format!("a:nth-of-type({})", index + 1))
            .with_href(href)
            .with_label(label)
    }

    pub fn button(index: usize, label: &str) -> SnapshotElement {
        SnapshotElement::new(index, ElementKind::Button, format!("button:nth-of-type({})", index + 1))
            .with_label(label)
    }

    pub fn input(index: usize, placeholder: &str) -> SnapshotElement {
        SnapshotElement::new(index, ElementKind::Input, format!("input:nth-of-type({})", index + 1))
            .with_label(placeholder)
    }

    pub fn text(text: &str, links: &[(u32, &str)]) -> TextResult {
        TextResult::new(
            text,
            links.iter().map(|(n, url)| (*n, url.to_string())).collect(),
        )
    }

    pub fn snapshot(elements: Vec<SnapshotElement>) -> SnapshotResult {
        SnapshotResult::new(elements, String::new())
    }

    pub fn count_elements_by_kind(view: &MergedView, kind: ElementKind) -> usize {
        view.mapping.values().filter(|m| m.kind == kind).count()
    }
}
