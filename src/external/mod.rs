//! Out-of-core collaborators that perform I/O.
//!
//! Nothing in decoding, detection, masking, or view derivation touches the
//! network or disk. The pieces here do, and each one is bounded by a timeout
//! and reports failures as [`ExternalCallError`] so callers can tell a blocked
//! URL from a slow upstream from a missing tool.

pub mod extract_tool;
pub mod fetch;
pub mod local_ai;
pub mod rate_limit;
pub mod remote_ai;
pub mod url_guard;

pub use extract_tool::{ExternalExtractor, ExtractedText};
pub use fetch::{FetchedContent, RemoteFetcher};
pub use local_ai::LocalAiClient;
pub use rate_limit::RateLimiter;
pub use remote_ai::RemoteAdvisor;
pub use url_guard::{is_allowed_local_endpoint, validate_target_url};

use crate::advisor::{AdvisorRequest, ChatMessage, Role};
use crate::error::ExternalCallError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A chat model that answers advisor requests.
#[async_trait]
pub trait AdvisorProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Run one completion and return the assistant text.
    async fn complete(&self, request: &AdvisorRequest) -> Result<String, ExternalCallError>;
}

/// Map a transport error from reqwest.
pub(crate) fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> ExternalCallError {
    if err.is_timeout() {
        ExternalCallError::Timeout(timeout)
    } else if let Some(status) = err.status() {
        ExternalCallError::UpstreamStatus {
            status: status.as_u16(),
            message: err.to_string(),
        }
    } else {
        ExternalCallError::Transport(err.to_string())
    }
}

/// OpenAI-compatible `chat/completions` body.
#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<WireMessage<'a>>,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> ChatCompletionRequest<'a> {
    pub(crate) fn new(model: &'a str, request: &'a AdvisorRequest) -> Self {
        Self {
            model,
            messages: request.messages.iter().map(wire_message).collect(),
            max_tokens: request.max_output_tokens,
            stream: false,
        }
    }
}

fn wire_message(message: &ChatMessage) -> WireMessage<'_> {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    WireMessage {
        role,
        content: &message.content,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// First non-empty choice.
    pub(crate) fn into_text(self) -> Result<String, ExternalCallError> {
        self.choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .find(|c| !c.trim().is_empty())
            .ok_or_else(|| ExternalCallError::InvalidResponse("completion had no content".to_string()))
    }
}

/// POST a chat completion and read the reply.
pub(crate) async fn post_chat_completion(
    client: &reqwest::Client,
    endpoint: &str,
    bearer: Option<&str>,
    body: &ChatCompletionRequest<'_>,
    timeout: Duration,
) -> Result<String, ExternalCallError> {
    let mut builder = client.post(endpoint).timeout(timeout).json(body);
    if let Some(token) = bearer {
        builder = builder.bearer_auth(token);
    }
    let response = builder
        .send()
        .await
        .map_err(|e| map_reqwest_error(e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        log::warn!("completion endpoint returned {}", status);
        return Err(ExternalCallError::UpstreamStatus {
            status: status.as_u16(),
            message: message.chars().take(512).collect(),
        });
    }

    let parsed: ChatCompletionResponse = response
        .json()
        .await
        .map_err(|e| ExternalCallError::InvalidResponse(e.to_string()))?;
    parsed.into_text()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = AdvisorRequest {
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            max_output_tokens: 64,
        };
        let body = ChatCompletionRequest::new("local-model", &request);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "local-model");
        assert_eq!(json["max_tokens"], 64);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_response_text() {
        let response: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"ok"}}]}"#).unwrap();
        assert_eq!(response.into_text().unwrap(), "ok");

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(empty.into_text(), Err(ExternalCallError::InvalidResponse(_))));
    }
}
