//! Hosted chat model behind an OpenAI-compatible API with bearer auth.

use super::url_guard::validate_target_url;
use super::{post_chat_completion, AdvisorProvider, ChatCompletionRequest};
use crate::advisor::AdvisorRequest;
use crate::config::ExternalConfig;
use crate::error::ExternalCallError;
use async_trait::async_trait;
use std::time::Duration;

/// Remote advisor client.
#[derive(Clone)]
pub struct RemoteAdvisor {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl std::fmt::Debug for RemoteAdvisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the key
        f.debug_struct("RemoteAdvisor")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RemoteAdvisor {
    /// Client for `base_url` (e.g. `https://api.openai.com/v1`).
    ///
    /// The URL must pass the same SSRF checks as the remote fetcher.
    pub fn new(base_url: &str, api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ExternalCallError> {
        validate_target_url(base_url)?;
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ExternalCallError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: super::local_ai::completions_url(base_url),
            api_key: api_key.into(),
            model: model.into(),
            timeout: ExternalConfig::default().remote_ai_timeout(),
        })
    }

    /// Read the key from `CAREERMASK_API_KEY`.
    pub fn from_env(base_url: &str, model: impl Into<String>) -> Result<Self, ExternalCallError> {
        let api_key = std::env::var("CAREERMASK_API_KEY")
            .map_err(|_| ExternalCallError::InvalidResponse("CAREERMASK_API_KEY not set".to_string()))?;
        Self::new(base_url, api_key, model)
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
}

#[async_trait]
impl AdvisorProvider for RemoteAdvisor {
    fn name(&self) -> &str {
        "remote"
    }

    async fn complete(&self, request: &AdvisorRequest) -> Result<String, ExternalCallError> {
        let body = ChatCompletionRequest::new(&self.model, request);
        post_chat_completion(&self.client, &self.endpoint, Some(&self.api_key), &body, self.timeout).await
    }
}
