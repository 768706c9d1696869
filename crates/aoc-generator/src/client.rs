//! Anthropic Messages API client with retry and rate-limit handling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use aoc_core::{CapabilityError, GenerativeCapability};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Required API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const MODEL_ENV: &str = "AOC_MODEL";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
    pub model: String,
    /// Scheme and host; `/v1/messages` is appended.
    pub base_url: String,
    pub max_tokens: u32,
    /// Retries after the first attempt, for 429 and 5xx only.
    pub max_retries: u32,
    /// First backoff delay, doubled after each retry.
    pub initial_backoff: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClaudeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 8192,
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            timeout: Duration::from_secs(300),
        }
    }

    /// Read `ANTHROPIC_API_KEY` and optionally `AOC_MODEL`.
    pub fn from_env() -> Result<Self, ClientError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(ClientError::MissingApiKey)?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var(MODEL_ENV) {
            if !model.is_empty() {
                config.model = model;
            }
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("response contained no text (stop reason: {0})")]
    Empty(String),
}

impl ClientError {
    fn is_retryable(&self) -> bool {
        match self {
            ClientError::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            ClientError::Timeout(_) => true,
            _ => false,
        }
    }
}

impl From<ClientError> for CapabilityError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Timeout(t) => CapabilityError::Timeout(t),
            ClientError::Api { status: 429, .. } => CapabilityError::Request(e.to_string()),
            ClientError::Api { status: 400..=499, .. } | ClientError::MissingApiKey => {
                CapabilityError::Refused(e.to_string())
            }
            ClientError::Parse(_) | ClientError::Empty(_) => CapabilityError::Malformed(e.to_string()),
            ClientError::Http(_) | ClientError::Api { .. } => CapabilityError::Request(e.to_string()),
        }
    }
}

/// Claude Messages API client.
pub struct ClaudeClient {
    http: reqwest::Client,
    config: ClaudeConfig,
}

impl ClaudeClient {
    pub fn new(config: ClaudeConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Http(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClaudeConfig::from_env()?)
    }

    pub fn config(&self) -> &ClaudeConfig {
        &self.config
    }

    /// Send a conversation, retrying rate limits and server errors.
    pub async fn complete_with_system(
        &self,
        messages: &[Message],
        system: Option<&str>,
    ) -> Result<String, ClientError> {
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0;

        loop {
            match self.complete_once(messages, system).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        event = "claude.retry",
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn complete_once(
        &self,
        messages: &[Message],
        system: Option<&str>,
    ) -> Result<String, ClientError> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages,
        };

        let response = self
            .http
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout(self.config.timeout)
                } else {
                    ClientError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        let text: String = parsed
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(ClientError::Empty(
                parsed.stop_reason.unwrap_or_else(|| "none".to_string()),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl GenerativeCapability for ClaudeClient {
    async fn invoke(&self, system: &str, prompt: &str) -> Result<String, CapabilityError> {
        let messages = [Message::user(prompt)];
        self.complete_with_system(&messages, Some(system))
            .await
            .map_err(CapabilityError::from)
    }
}
