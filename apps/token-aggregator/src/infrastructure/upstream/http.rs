//! HTTP client wrapper with retry logic.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use super::retry::{RetryConfig, RetryPolicy};
use crate::infrastructure::config::UpstreamSettings;
use crate::infrastructure::metrics;

/// Upstream request failure.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    /// Transport or body read failure.
    #[error("network error: {0}")]
    Network(String),
    /// Non-retryable HTTP status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// Still rate limited after the retry budget.
    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited {
        /// Last `Retry-After` value, if sent.
        retry_after_secs: Option<u64>,
    },
    /// The body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// Transient failures persisted past the retry budget.
    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Total attempts, including the first.
        attempts: u32,
        /// Last failure seen.
        last: String,
    },
}

/// Shared HTTP client for upstream quote APIs.
#[derive(Debug, Clone)]
pub struct UpstreamHttpClient {
    client: Client,
    retry: RetryConfig,
}

impl UpstreamHttpClient {
    /// Create a client with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration, retry: RetryConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("token-aggregator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Client(e.to_string()))?;

        Ok(Self { client, retry })
    }

    /// Create a client from `UpstreamSettings`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn from_settings(settings: &UpstreamSettings) -> Result<Self, UpstreamError> {
        Self::new(
            settings.request_timeout,
            RetryConfig::from_settings(settings),
        )
    }

    /// GET `url` with `query` parameters and decode the JSON body.
    ///
    /// Retries on 429 (honouring `Retry-After`), 408, 5xx and transport
    /// failures, including a body cut off after a success status.
    /// Everything else fails immediately.
    ///
    /// # Errors
    ///
    /// Returns the final failure once retries are exhausted or a
    /// non-retryable failure occurs.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        source: &'static str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        let mut policy = RetryPolicy::new(self.retry.clone());

        loop {
            let (failure, retry_after) = match self.client.get(url).query(query).send().await {
                Ok(response) if response.status().is_success() => match response.bytes().await {
                    Ok(body) => {
                        return serde_json::from_slice(&body)
                            .map_err(|e| UpstreamError::Decode(e.to_string()));
                    }
                    // Connection dropped mid-body
                    Err(e) => (UpstreamError::Network(e.to_string()), None),
                },
                Ok(response) => {
                    let status = response.status();
                    let retry_after = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse::<u64>().ok());

                    match categorize_status(status) {
                        ErrorCategory::RateLimited => (
                            UpstreamError::RateLimited {
                                retry_after_secs: retry_after,
                            },
                            retry_after.map(Duration::from_secs),
                        ),
                        ErrorCategory::Retryable => (
                            UpstreamError::Status {
                                status: status.as_u16(),
                                body: String::new(),
                            },
                            None,
                        ),
                        ErrorCategory::NonRetryable => {
                            let body = response.text().await.unwrap_or_default();
                            return Err(UpstreamError::Status {
                                status: status.as_u16(),
                                body,
                            });
                        }
                    }
                }
                Err(e) if e.is_builder() => return Err(UpstreamError::Network(e.to_string())),
                Err(e) => (UpstreamError::Network(e.to_string()), None),
            };

            let Some(delay) = policy.next_delay() else {
                return Err(match failure {
                    UpstreamError::RateLimited { .. } => failure,
                    other => UpstreamError::RetriesExhausted {
                        attempts: policy.retries() + 1,
                        last: other.to_string(),
                    },
                });
            };
            let delay = retry_after.map_or(delay, |server| policy.clamp(server));

            metrics::record_upstream_retry(source);
            tracing::warn!(
                source,
                error = %failure,
                attempt = policy.retries(),
                delay_ms = delay.as_millis(),
                "Upstream request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Error category for determining retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorCategory {
    RateLimited,
    Retryable,
    NonRetryable,
}

/// Categorize HTTP status code for retry handling.
const fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        429 => ErrorCategory::RateLimited,
        408 | 500..=599 => ErrorCategory::Retryable,
        _ => ErrorCategory::NonRetryable,
    }
}
