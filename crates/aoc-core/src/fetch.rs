//! HTTP scraping collaborator.
//!
//! Retries transient failures (429, 5xx, connect/timeouts) with exponential
//! backoff. The catalog above it never retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::warn;

use crate::capability::StatementFetcher;
use crate::error::FetchError;

/// Environment variable holding the puzzle site session cookie.
pub const SESSION_ENV: &str = "AOC_SESSION";

const USER_AGENT: &str = concat!("aoc-synth/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Session cookie value. Part two statements are only served with one.
    pub session: Option<String>,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First backoff delay, doubled after each retry.
    pub initial_backoff: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            session: None,
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

impl FetcherConfig {
    /// Default config with the session read from `AOC_SESSION`.
    pub fn from_env() -> Self {
        Self {
            session: std::env::var(SESSION_ENV).ok().filter(|s| !s.is_empty()),
            ..Default::default()
        }
    }
}

/// One failed request, tagged with whether it is worth retrying.
struct AttemptFailure {
    error: FetchError,
    retryable: bool,
}

pub struct HttpStatementFetcher {
    http: reqwest::Client,
    config: FetcherConfig,
}

impl HttpStatementFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, config })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, AttemptFailure> {
        let mut request = self.http.get(url);
        if let Some(ref session) = self.config.session {
            request = request.header(reqwest::header::COOKIE, format!("session={session}"));
        }

        let response = request.send().await.map_err(|e| AttemptFailure {
            retryable: e.is_timeout() || e.is_connect(),
            error: FetchError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            },
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AttemptFailure {
                error: FetchError::NotFound {
                    url: url.to_string(),
                },
                retryable: false,
            });
        }
        if !status.is_success() {
            return Err(AttemptFailure {
                error: FetchError::Transport {
                    url: url.to_string(),
                    reason: format!("HTTP {status}"),
                },
                retryable: status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
            });
        }

        response.text().await.map_err(|e| AttemptFailure {
            error: FetchError::Transport {
                url: url.to_string(),
                reason: format!("failed to read body: {e}"),
            },
            retryable: false,
        })
    }
}

#[async_trait]
impl StatementFetcher for HttpStatementFetcher {
    async fn fetch_statement(&self, url: &str) -> Result<String, FetchError> {
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0;

        loop {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(failure) if failure.retryable && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        event = "fetch.retry",
                        url = %url,
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %failure.error,
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }
}
