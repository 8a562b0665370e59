pub mod anthropic;
pub mod google;
pub mod manager;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use manager::{build_provider, create_llm_manager, LlmManager};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use crate::core::LlmError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// Falls back to a default client, without the request timeout, when the
/// configured one cannot be built.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, ?timeout, "HTTP client build failed, using defaults without timeout");
            reqwest::Client::new()
        }
    }
}

/// Sends `body` as JSON and decodes a successful JSON reply into `R`.
pub(crate) async fn post_json<B, R>(
    provider: &str,
    request: reqwest::RequestBuilder,
    body: &B,
) -> Result<R, LlmError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| LlmError::Unreachable {
            provider: provider.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    response.json::<R>().await.map_err(|e| LlmError::UnexpectedResponse {
        provider: provider.to_string(),
        reason: e.to_string(),
    })
}

/// Explicit key first, then the provider's environment variable.
pub(crate) fn resolve_api_key(
    provider: &str,
    explicit: Option<String>,
    from_env: Option<String>,
    env_var: &str,
) -> Result<String, LlmError> {
    explicit
        .or(from_env)
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| LlmError::NotConfigured {
            provider: provider.to_string(),
            reason: format!("API key required, set {}", env_var),
        })
}

pub(crate) fn empty_reply(provider: &str) -> LlmError {
    LlmError::UnexpectedResponse {
        provider: provider.to_string(),
        reason: "no text in reply".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_resolve_api_key_prefers_explicit() {
        let key = assert_ok!(resolve_api_key(
            "openai",
            Some("sk-explicit".into()),
            Some("sk-env".into()),
            "OPENAI_API_KEY"
        ));
        assert_eq!(key, "sk-explicit");

        let key = assert_ok!(resolve_api_key("openai", None, Some("sk-env".into()), "OPENAI_API_KEY"));
        assert_eq!(key, "sk-env");
    }

    #[test]
    fn test_resolve_api_key_missing_or_blank() {
        let err = assert_err!(resolve_api_key("google", None, None, "GOOGLE_API_KEY"));
        assert_eq!(
            err.to_string(),
            "google is not configured: API key required, set GOOGLE_API_KEY"
        );
        assert_err!(resolve_api_key("google", Some("  ".into()), None, "GOOGLE_API_KEY"));
    }

    #[tokio::test]
    async fn test_http_client_applies_timeout() {
        let listener = assert_ok!(tokio::net::TcpListener::bind("127.0.0.1:0").await);
        let addr = assert_ok!(listener.local_addr());
        // accept and hold the connection without ever answering
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await?;
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
            Ok::<_, std::io::Error>(())
        });

        let client = http_client(Duration::from_millis(200));
        let err = assert_err!(client.get(format!("http://{}/", addr)).send().await);
        assert!(err.is_timeout());
        server.abort();
    }
}
