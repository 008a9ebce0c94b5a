use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::util::{bounded, truncate_chars, Interrupted};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Longest upstream error message carried into [`LlmError::Api`].
const MAX_ERROR_MESSAGE_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("No model API key configured (set ANTHROPIC_API_KEY)")]
    MissingApiKey,
    #[error("Model request timed out")]
    Timeout,
    #[error("Model request cancelled")]
    Cancelled,
    #[error("Model request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Model API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Unexpected model API response: {0}")]
    InvalidResponse(String),
    #[error("Model returned no text")]
    EmptyResponse,
}

impl From<Interrupted> for LlmError {
    fn from(value: Interrupted) -> Self {
        match value {
            Interrupted::TimedOut(_) => LlmError::Timeout,
            Interrupted::Cancelled => LlmError::Cancelled,
        }
    }
}

/// One single-turn completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Ceiling on generated tokens.
    pub max_tokens: u32,
}

/// A text-in, text-out language model.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Returns the raw text the model produced for `request`.
    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Anthropic Messages API client.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AnthropicClient {
    pub fn new(
        http: reqwest::Client,
        api_key: Option<SecretString>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionModel for AnthropicClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let api_key = self.api_key.as_ref().ok_or(LlmError::MissingApiKey)?;

        let body = serde_json::to_vec(&MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
        })
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!(
            model = %self.model,
            max_tokens = request.max_tokens,
            prompt_chars = request.prompt.len(),
            "Sending completion request"
        );

        let (status, bytes) = bounded(self.timeout, cancel, async {
            let response = self
                .http
                .post(&url)
                .header("x-api-key", api_key.expose_secret())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            Ok::<_, LlmError>((status, bytes))
        })
        .await??;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorEnvelope>(&bytes)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: truncate_chars(message.trim(), MAX_ERROR_MESSAGE_CHARS).to_string(),
            });
        }

        let parsed: MessagesResponse = serde_json::from_slice(&bytes)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or(LlmError::EmptyResponse)?;

        tracing::debug!(raw = %text, "Model response");
        Ok(text)
    }
}
