/*!
 * Provider implementations for LLM-backed translation.
 *
 * This module contains client implementations for the supported providers:
 * - Ollama: Local LLM server
 * - Anthropic: Anthropic API integration
 * - Mock: scripted behaviors for tests
 */

use async_trait::async_trait;
use log::warn;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use crate::errors::ProviderError;

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably in the translation service.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Build a request carrying a system prompt and the user text
    fn build_request(&self, system_prompt: &str, text: &str) -> Self::Request;

    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The request to complete
    ///
    /// # Returns
    /// * `Result<Self::Response, ProviderError>` - The response from the provider or an error
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Extract text from the provider response
    fn extract_text(response: &Self::Response) -> String;
}

/// Retry and pacing settings shared by the HTTP providers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first one
    pub max_retries: u32,
    /// Base backoff time in milliseconds, doubled on each retry
    pub backoff_base_ms: u64,
    /// Optional rate limit in requests per minute
    pub rate_limit: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1000,
            rate_limit: None,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponential = self.backoff_base_ms.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16));
        let paced = self.rate_limit.filter(|limit| *limit > 0).map_or(0, |limit| 60_000 / limit as u64);
        Duration::from_millis(exponential.max(paced))
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of attempts
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable(&e) && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    warn!(
                        "{} request failed: {} - retrying in {:?} (attempt {}/{})",
                        label,
                        e,
                        delay,
                        attempt + 1,
                        self.max_retries + 1
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Whether an error is worth another attempt
pub fn is_retryable(error: &ProviderError) -> bool {
    match error {
        ProviderError::RequestFailed(_)
        | ProviderError::ConnectionError(_)
        | ProviderError::RateLimitExceeded(_) => true,
        ProviderError::ApiError { status_code, .. } => *status_code >= 500,
        ProviderError::ParseError(_) | ProviderError::AuthenticationError(_) => false,
    }
}

/// Map a non-success HTTP status to a provider error
pub fn status_error(status_code: u16, message: String) -> ProviderError {
    match status_code {
        401 | 403 => ProviderError::AuthenticationError(message),
        429 => ProviderError::RateLimitExceeded(message),
        _ => ProviderError::ApiError { status_code, message },
    }
}

/// Map a transport failure to a provider error
pub fn transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_connect() || error.is_timeout() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

pub mod anthropic;
pub mod mock;
pub mod ollama;
