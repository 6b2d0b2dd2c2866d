//! Shared HTTP client for HTTP-based LLM providers
//!
//! One `reqwest::Client` per backend, with per-request timeouts and a bounded
//! retry policy: 429, 5xx and network failures back off and retry, other 4xx
//! fail immediately.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use formloop_utils::error::LlmError;

/// Default maximum HTTP timeout (5 minutes)
const DEFAULT_MAX_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Initial backoff duration for retries, multiplied by the attempt number
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Arc<Client>,
    max_timeout: Duration,
    max_retries: u32,
}

impl HttpClient {
    pub fn new(max_retries: u32) -> Result<Self, LlmError> {
        Self::with_max_timeout(DEFAULT_MAX_HTTP_TIMEOUT, max_retries)
    }

    pub fn with_max_timeout(max_timeout: Duration, max_retries: u32) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| LlmError::Misconfiguration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            max_timeout,
            max_retries,
        })
    }

    /// Underlying `reqwest::Client`, for building requests.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Execute a request with timeout and retry policy.
    ///
    /// The effective timeout is `min(request_timeout, max_timeout)`.
    pub async fn execute_with_retry(
        &self,
        request_builder: reqwest::RequestBuilder,
        request_timeout: Duration,
        provider_name: &str,
    ) -> Result<Response, LlmError> {
        let effective_timeout = request_timeout.min(self.max_timeout);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let request = request_builder
                .try_clone()
                .ok_or_else(|| LlmError::Transport("Failed to clone request for retry".to_string()))?
                .timeout(effective_timeout)
                .build()
                .map_err(|e| LlmError::Transport(format!("Failed to build request: {e}")))?;

            debug!(
                provider = provider_name,
                attempt = attempt,
                timeout_secs = effective_timeout.as_secs(),
                "Executing HTTP request"
            );

            let error = match self.client.execute(request).await {
                Ok(response) => match status_error(response.status(), provider_name) {
                    None => return Ok(response),
                    Some(err) => err,
                },
                Err(e) if e.is_timeout() => {
                    return Err(LlmError::Timeout {
                        duration: effective_timeout,
                    });
                }
                Err(e) => LlmError::Transport(format!(
                    "{provider_name} request failed: {}",
                    redact_error_message(&e.to_string())
                )),
            };

            if !error.is_retryable() || attempt > self.max_retries {
                return Err(error);
            }

            warn!(
                provider = provider_name,
                attempt = attempt,
                error = %error,
                "Request failed, will retry"
            );
            tokio::time::sleep(INITIAL_BACKOFF * attempt).await;
        }
    }
}

/// The error a non-success status maps to; `None` for success.
fn status_error(status: StatusCode, provider_name: &str) -> Option<LlmError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LlmError::ProviderAuth(format!("{provider_name} authentication failed: {status}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            LlmError::ProviderQuota(format!("{provider_name} rate limit exceeded: {status}"))
        }
        s if s.is_server_error() => {
            LlmError::ProviderOutage(format!("{provider_name} returned server error: {status}"))
        }
        _ => LlmError::Rejected(format!("{provider_name} rejected the request: {status}")),
    })
}

static URL_WITH_CREDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(https?://)[^:@\s]+:[^@\s]+@").expect("static regex"));

/// Long token-like runs (API keys, bearer tokens)
static POTENTIAL_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9_-]{32,}").expect("static regex"));

/// Strip credentials and key-like strings from transport errors before logging.
fn redact_error_message(message: &str) -> String {
    let redacted = URL_WITH_CREDS.replace_all(message, "$1[REDACTED]@");
    POTENTIAL_KEY
        .replace_all(&redacted, "[REDACTED_KEY]")
        .to_string()
}
