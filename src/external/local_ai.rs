//! OpenAI-compatible chat client for a model served on the local machine
//! (Ollama, llama.cpp server, LM Studio, ...).

use super::url_guard::is_allowed_local_endpoint;
use super::{post_chat_completion, AdvisorProvider, ChatCompletionRequest};
use crate::advisor::AdvisorRequest;
use crate::config::ExternalConfig;
use crate::error::ExternalCallError;
use async_trait::async_trait;
use std::time::Duration;

/// Base URL used when none is configured.
pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:11434/v1";

/// `{base}/chat/completions`, with trailing slashes removed from `base`.
pub fn completions_url(base: &str) -> String {
    format!("{}/chat/completions", base.trim().trim_end_matches('/'))
}

/// Local model client. Only loopback endpoints are accepted and redirects are
/// never followed.
#[derive(Debug, Clone)]
pub struct LocalAiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl LocalAiClient {
    /// Client for `base_url` (e.g. `http://localhost:11434/v1`).
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, ExternalCallError> {
        if !is_allowed_local_endpoint(base_url) {
            log::warn!("rejected non-local AI endpoint {}", base_url);
            return Err(ExternalCallError::blocked(format!(
                "'{}' is not a local endpoint",
                base_url
            )));
        }
        // Loopback traffic must not leave through an environment proxy
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|e| ExternalCallError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: completions_url(base_url),
            model: model.into(),
            timeout: ExternalConfig::default().local_ai_timeout(),
        })
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full completion URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Model name sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AdvisorProvider for LocalAiClient {
    fn name(&self) -> &str {
        "local"
    }

    async fn complete(&self, request: &AdvisorRequest) -> Result<String, ExternalCallError> {
        let body = ChatCompletionRequest::new(&self.model, request);
        post_chat_completion(&self.client, &self.endpoint, None, &body, self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slashes_stripped() {
        assert_eq!(
            completions_url("http://localhost:11434/v1///"),
            "http://localhost:11434/v1/chat/completions"
        );
        let client = LocalAiClient::new("http://127.0.0.1:8080/v1/", "llama3").unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:8080/v1/chat/completions");
        assert_eq!(client.model(), "llama3");
    }

    #[test]
    fn test_rejects_remote_endpoints() {
        for url in [
            "http://localhost.evil.example/v1",
            "https://api.example.com/v1",
            "http://169.254.169.254/latest/meta-data",
        ] {
            assert!(matches!(
                LocalAiClient::new(url, "m"),
                Err(ExternalCallError::Blocked { .. })
            ));
        }
    }
}
