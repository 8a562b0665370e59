use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

const JSON_INSTRUCTION: &str = "\n\nReturn ONLY valid JSON. No markdown, no explanation.";

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            temperature: 0.3,
            max_tokens: 2000,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub tokens_used: Option<u64>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("{provider} unreachable: {reason}")]
    Unreachable { provider: String, reason: String },

    #[error("{provider} returned status {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} response had unexpected shape: {reason}")]
    UnexpectedResponse { provider: String, reason: String },

    #[error("{provider} is not configured: {reason}")]
    NotConfigured { provider: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JsonGenerationError {
    #[error(transparent)]
    Generation(#[from] LlmError),

    #[error("Invalid JSON: {message}")]
    Malformed { message: String, raw_text: String },
}

/// The external text-generation capability. Non-deterministic and fallible;
/// nothing in the merge pipeline depends on a live implementation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, LlmError>;
}

/// Asks for a JSON-only reply and parses it, tolerating fenced code blocks.
pub async fn generate_json(
    generator: &dyn TextGenerator,
    request: &GenerationRequest,
) -> Result<Value, JsonGenerationError> {
    let mut request = request.clone();
    request.prompt.push_str(JSON_INSTRUCTION);

    let generation = generator.generate(&request).await?;
    let text = strip_code_fences(&generation.text);

    serde_json::from_str(&text).map_err(|e| JsonGenerationError::Malformed {
        message: e.to_string(),
        raw_text: text,
    })
}

/// Removes a surrounding ```` ``` ```` / ```` ```json ```` fence if present.
pub fn strip_code_fences(text: &str) -> String {
    let text = text.trim();
    if !text.starts_with("```") {
        return text.to_string();
    }

    let lines: Vec<&str> = text.lines().collect();
    let inner = if lines.len() > 2 {
        lines[1..lines.len() - 1].join("\n")
    } else {
        text.to_string()
    };

    inner.replace("```json", "").replace("```", "").trim().to_string()
}
