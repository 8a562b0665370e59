use crate::core::{Generation, GenerationRequest, LlmError, TextGenerator};
use crate::llm::{empty_reply, http_client, post_json, resolve_api_key};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat completions. Also works with compatible servers via `base_url`.
pub struct OpenAiProvider {
    client: reqwest::Client,
    model: String,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: Option<u64>,
}

impl OpenAiProvider {
    pub fn new(
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let api_key = resolve_api_key("openai", api_key, std::env::var(API_KEY_ENV).ok(), API_KEY_ENV)?;
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

    fn request_body<'a>(&'a self, request: &'a GenerationRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        ChatRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, LlmError> {
        let http = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key);

        let reply: ChatResponse = post_json(self.name(), http, &self.request_body(request)).await?;
        let tokens_used = reply.usage.and_then(|u| u.total_tokens);
        let text = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| empty_reply(self.name()))?;

        Ok(Generation { text, tokens_used })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_orders_system_first() {
        let provider =
            OpenAiProvider::new("gpt-4o-mini", Some("sk-test".into()), None, Duration::from_secs(5)).unwrap();
        let request = GenerationRequest::new("hello").with_system_prompt("rules");
        let body = serde_json::to_value(provider.request_body(&request)).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["max_tokens"], 2000);

        let bare = serde_json::to_value(provider.request_body(&GenerationRequest::new("x"))).unwrap();
        assert_eq!(bare["messages"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_response_decoding() {
        let reply: ChatResponse = serde_json::from_str(
            r#"{"id":"c1","choices":[{"index":0,"message":{"role":"assistant","content":"{}"}}],
                "usage":{"prompt_tokens":3,"completion_tokens":1,"total_tokens":4}}"#,
        )
        .unwrap();
        assert_eq!(reply.choices[0].message.content.as_deref(), Some("{}"));
        assert_eq!(reply.usage.and_then(|u| u.total_tokens), Some(4));
    }
}
