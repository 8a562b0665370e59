use crate::core::{Generation, GenerationRequest, LlmError, TextGenerator};
use crate::llm::{empty_reply, http_client, post_json, resolve_api_key};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini over the `generateContent` REST endpoint.
pub struct GoogleProvider {
    client: reqwest::Client,
    model: String,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiReplyContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiReplyContent {
    #[serde(default)]
    parts: Vec<GeminiReplyPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiReplyPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    total_token_count: Option<u64>,
}

impl GoogleProvider {
    pub fn new(
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let api_key = resolve_api_key("google", api_key, std::env::var(API_KEY_ENV).ok(), API_KEY_ENV)?;
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

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body<'a>(&self, request: &'a GenerationRequest) -> GeminiRequest<'a> {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart {
                    text: &request.prompt,
                }],
            }],
            system_instruction: request.system_prompt.as_deref().map(|system| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: system }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }
}

fn reply_text(reply: GeminiResponse) -> Option<(String, Option<u64>)> {
    let tokens = reply.usage_metadata.and_then(|u| u.total_token_count);
    let text: String = reply
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .map(|p| p.text)
        .collect();
    Some((text, tokens))
}

#[async_trait]
impl TextGenerator for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, LlmError> {
        let http = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key);

        let reply: GeminiResponse = post_json(self.name(), http, &self.request_body(request)).await?;
        let (text, tokens_used) = reply_text(reply).ok_or_else(|| empty_reply(self.name()))?;

        Ok(Generation { text, tokens_used })
    }
}
