use crate::core::{Generation, GenerationRequest, LlmConfig, LlmError, ProviderKind, TextGenerator};
use crate::errors::{Result, TextViewError};
use crate::llm::{AnthropicProvider, GoogleProvider, OllamaProvider, OpenAiProvider};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

/// A primary provider with an optional second one tried when it fails.
pub struct LlmManager {
    primary: Box<dyn TextGenerator>,
    fallback: Option<Box<dyn TextGenerator>>,
}

impl LlmManager {
    pub fn new(primary: Box<dyn TextGenerator>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn TextGenerator>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

#[async_trait]
impl TextGenerator for LlmManager {
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn generate(&self, request: &GenerationRequest) -> std::result::Result<Generation, LlmError> {
        let err = match self.primary.generate(request).await {
            Ok(generation) => return Ok(generation),
            Err(err) => err,
        };

        let Some(fallback) = &self.fallback else {
            return Err(err);
        };

        warn!(
            primary = self.primary.name(),
            fallback = fallback.name(),
            error = %err,
            "primary LLM failed, trying fallback"
        );
        fallback.generate(request).await
    }
}

/// Constructs one provider. Remote providers fail here when no API key is
/// available from `api_key` or their environment variable.
pub fn build_provider(
    kind: ProviderKind,
    model: Option<&str>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Duration,
) -> std::result::Result<Box<dyn TextGenerator>, LlmError> {
    let model = model.unwrap_or(kind.default_model()).to_string();

    Ok(match kind {
        ProviderKind::Ollama => Box::new(OllamaProvider::new(model, base_url, timeout)),
        ProviderKind::Google => Box::new(GoogleProvider::new(model, api_key, base_url, timeout)?),
        ProviderKind::OpenAi => Box::new(OpenAiProvider::new(model, api_key, base_url, timeout)?),
        ProviderKind::Anthropic => {
            Box::new(AnthropicProvider::new(model, api_key, base_url, timeout)?)
        }
    })
}

/// Builds the manager described by `config`.
///
/// A primary provider that cannot be built is an error; a fallback that
/// cannot be built is logged and left out.
pub fn create_llm_manager(config: &LlmConfig) -> Result<LlmManager> {
    let timeout = config.request_timeout();
    let primary = build_provider(
        config.provider,
        config.model.as_deref(),
        config.api_key.clone(),
        config.base_url.clone(),
        timeout,
    )
    .map_err(|e| TextViewError::Config(e.to_string()))?;

    let mut manager = LlmManager::new(primary);

    if let Some(kind) = config.fallback_provider {
        match build_provider(
            kind,
            config.fallback_model.as_deref(),
            config.fallback_api_key.clone(),
            None,
            timeout,
        ) {
            Ok(fallback) => manager = manager.with_fallback(fallback),
            Err(e) => warn!(error = %e, "could not create fallback LLM provider"),
        }
    }

    info!(
        provider = manager.name(),
        fallback = manager.has_fallback(),
        "LLM manager ready"
    );
    Ok(manager)
}
