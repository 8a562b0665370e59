use crate::core::{Generation, GenerationRequest, LlmError, TextGenerator};
use crate::llm::{empty_reply, http_client, post_json, resolve_api_key};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API.
pub struct AnthropicProvider {
    client: reqwest::Client,
    model: String,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl AnthropicProvider {
    pub fn new(
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let api_key =
            resolve_api_key("anthropic", api_key, std::env::var(API_KEY_ENV).ok(), API_KEY_ENV)?;
        Ok(Self {
            client: http_client(timeout),
            model: model.into(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    fn request_body<'a>(&'a self, request: &'a GenerationRequest) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system_prompt.as_deref(),
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        }
    }
}

fn reply_text(reply: MessagesResponse) -> Option<(String, Option<u64>)> {
    let tokens = reply.usage.map(|u| u.input_tokens + u.output_tokens);
    reply
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .map(|block| (block.text, tokens))
}

#[async_trait]
impl TextGenerator for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, LlmError> {
        let http = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION);

        let reply: MessagesResponse =
            post_json(self.name(), http, &self.request_body(request)).await?;
        let (text, tokens_used) = reply_text(reply).ok_or_else(|| empty_reply(self.name()))?;

        Ok(Generation { text, tokens_used })
    }
}
