//! HTTP client for the chat-completions endpoint.
//!
//! Retries are narrow: connection-level failures and HTTP 429, up to three
//! attempts with exponential backoff and jitter. Any other non-2xx status is
//! surfaced immediately; 5xx is deliberately not retried. Backoff sleeps and
//! the request itself race the cancellation token.

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ApiError;
use crate::config::ProviderConfig;
use crate::tools::{ToolChoice, ToolDefinition};
use crate::types::{Message, ThinkingConfig};

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_JITTER_MS: u64 = 250;

/// A chat-completions request body.
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    pub stream: bool,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
}

impl<'a> ChatRequest<'a> {
    /// A minimal request: no tools, no thinking, default temperature.
    pub(crate) fn new(model: &'a str, messages: &'a [Message], stream: bool) -> Self {
        Self {
            model,
            messages,
            tools: Vec::new(),
            tool_choice: None,
            stream,
            temperature: 0.7,
            thinking: None,
            response_format: None,
        }
    }
}

/// The `thinking` request field in wire form.
#[derive(Debug, Serialize)]
pub(crate) struct ThinkingWire {
    #[serde(rename = "type")]
    mode: &'static str,
}

impl From<&ThinkingConfig> for ThinkingWire {
    fn from(config: &ThinkingConfig) -> Self {
        Self {
            mode: if config.enabled { "enabled" } else { "disabled" },
        }
    }
}

/// Shared HTTP client; read-only after construction, reusable across calls.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl ApiClient {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// [`ApiError::MissingApiKey`] when no key is configured.
    pub fn new(config: &ProviderConfig) -> Result<Self, ApiError> {
        let api_key = config.api_key().cloned().ok_or(ApiError::MissingApiKey)?;
        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: config.base_url().to_string(),
        })
    }

    /// Sends a streaming request and returns the open response for SSE
    /// consumption.
    pub(crate) async fn stream_chat(
        &self,
        request: &ChatRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, ApiError> {
        self.send_with_retry(request, cancel).await
    }

    /// Sends a non-streaming request and returns the first choice's message
    /// content. Used for the one-shot vision description call.
    pub(crate) async fn complete_chat(
        &self,
        request: &ChatRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        let response = self.send_with_retry(request, cancel).await?;
        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ApiError::MalformedResponse("response has no message content".into()))
    }

    async fn send_with_retry(
        &self,
        request: &ChatRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}/chat/completions", self.base_url);

        for attempt in 1..=MAX_ATTEMPTS {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let send = self
                .http
                .post(&url)
                .bearer_auth(self.api_key.expose_secret())
                .json(request)
                .send();
            let result = tokio::select! {
                () = cancel.cancelled() => return Err(ApiError::Cancelled),
                result = send => result,
            };

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        debug!(attempt, "chat request accepted");
                        return Ok(response);
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        if attempt == MAX_ATTEMPTS {
                            return Err(ApiError::RateLimited { attempts: attempt });
                        }
                        warn!(attempt, "rate limited, backing off");
                        backoff(attempt, cancel).await?;
                        continue;
                    }
                    // 5xx included: any other status is terminal.
                    let body = response.text().await.unwrap_or_default();
                    return Err(ApiError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) => {
                    if attempt == MAX_ATTEMPTS {
                        return Err(e.into());
                    }
                    warn!(attempt, error = %e, "connection error, backing off");
                    backoff(attempt, cancel).await?;
                }
            }
        }

        Err(ApiError::RateLimited {
            attempts: MAX_ATTEMPTS,
        })
    }
}

/// Exponential backoff with jitter; aborts early on cancellation.
async fn backoff(attempt: u32, cancel: &CancellationToken) -> Result<(), ApiError> {
    let jitter = rand::thread_rng().gen_range(0..BACKOFF_JITTER_MS);
    let delay = BACKOFF_BASE * 2u32.saturating_pow(attempt - 1) + Duration::from_millis(jitter);
    tokio::select! {
        () = cancel.cancelled() => Err(ApiError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
