use crate::errors::{Result, TextViewError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration, loadable from a TOML file.
///
/// ```toml
/// [engine]
/// use_text_source = true
/// overall_timeout_ms = 45000
///
/// [llm]
/// enabled = true
/// provider = "ollama"
/// model = "llama3.2:3b"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub llm: LlmConfig,
    pub display: DisplayConfig,
    pub merge: MergeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub use_text_source: bool,
    pub lynx_path: String,
    pub headless: bool,
    pub user_agent: Option<String>,
    pub text_timeout_ms: u64,
    pub snapshot_timeout_ms: u64,
    pub overall_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    Google,
    OpenAi,
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: ProviderKind,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub fallback_provider: Option<ProviderKind>,
    pub fallback_model: Option<String>,
    pub fallback_api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub advisor_context_chars: usize,
    pub advisor_label_chars: usize,
    pub fallback_element_limit: usize,
    pub fallback_wrap_width: usize,
    pub fallback_label_chars: usize,
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| TextViewError::Config(e.to_string()))
    }

    /// Loads `path`, or returns defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| TextViewError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }
}

impl EngineConfig {
    pub fn text_timeout(&self) -> Duration {
        Duration::from_millis(self.text_timeout_ms)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_text_source: true,
            lynx_path: "lynx".to_string(),
            headless: true,
            user_agent: Some(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            text_timeout_ms: 30_000,
            snapshot_timeout_ms: 30_000,
            overall_timeout_ms: 45_000,
        }
    }
}

impl ProviderKind {
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "llama3.2:3b",
            ProviderKind::Google => "gemini-1.5-flash",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-haiku-20240307",
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: ProviderKind::Ollama,
            model: None,
            api_key: None,
            base_url: None,
            fallback_provider: None,
            fallback_model: None,
            fallback_api_key: None,
            temperature: 0.3,
            max_tokens: 2000,
            request_timeout_ms: 60_000,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { width: 80 }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            advisor_context_chars: 3000,
            advisor_label_chars: 100,
            fallback_element_limit: 50,
            fallback_wrap_width: 80,
            fallback_label_chars: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = assert_ok!(Config::from_toml_str(
            r#"
            [engine]
            use_text_source = false
            overall_timeout_ms = 1000

            [llm]
            provider = "anthropic"
            fallback_provider = "ollama"
            "#,
        ));

        assert!(!config.engine.use_text_source);
        assert_eq!(config.engine.overall_timeout(), Duration::from_secs(1));
        assert_eq!(config.engine.text_timeout_ms, 30_000);
        assert_eq!(config.llm.provider, ProviderKind::Anthropic);
        assert_eq!(config.llm.fallback_provider, Some(ProviderKind::Ollama));
        assert!(config.llm.enabled);
        assert_eq!(config.display.width, 80);
        assert_eq!(config.merge.fallback_element_limit, 50);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = assert_err!(Config::from_toml_str("[engine\nuse_text_source = "));
        assert!(matches!(err, TextViewError::Config(_)));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert_err!(Config::from_toml_str("[llm]\nprovider = \"mystery\""));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = assert_ok!(Config::load("/definitely/not/here/textview.toml"));
        assert_eq!(config.llm.provider, ProviderKind::Ollama);
        assert_eq!(config.llm.provider.default_model(), "llama3.2:3b");
    }
}
