use crate::core::{Generation, GenerationRequest, LlmError, TextGenerator};
use crate::llm::{http_client, post_json};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Local model served by Ollama.
pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    eval_count: Option<u64>,
}

impl OllamaProvider {
    pub fn new(model: impl Into<String>, base_url: Option<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            model: model.into(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, request: &GenerationRequest) -> OllamaRequest<'_> {
        // /api/generate has no separate system field in this mode
        let prompt = match &request.system_prompt {
            Some(system) => format!("{}\n\n{}", system, request.prompt),
            None => request.prompt.clone(),
        };

        OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = self.request_body(request);

        let reply: OllamaResponse = post_json(self.name(), self.client.post(&url), &body)
            .await
            .map_err(|err| match err {
                LlmError::Unreachable { provider, reason } => LlmError::Unreachable {
                    provider,
                    reason: format!("{} (is `ollama serve` running?)", reason),
                },
                other => other,
            })?;

        Ok(Generation {
            text: reply.response,
            tokens_used: reply.eval_count,
        })
    }
}
