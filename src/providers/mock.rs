/*!
 * Mock provider implementations for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockProvider::working()` - Always succeeds, echoing every entry with a prefix
 * - `MockProvider::partial_markers()` - Loses markers in multi-entry answers
 * - `MockProvider::failing()` - Always fails with an error
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ProviderError;
use crate::providers::Provider;
use crate::translation::markers::{END_MARKER, count_entries, decode_entries, encode_entries};

/// Prefix the working mock puts in front of every translated entry
pub const TRANSLATED_PREFIX: &str = "[TRANSLATED] ";

/// Mock request for testing
#[derive(Debug, Clone)]
pub struct MockRequest {
    /// System prompt the service built
    pub system_prompt: String,
    /// The text to translate, marker-delimited for batches
    pub text: String,
}

/// Mock response for testing
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// The translated text
    pub text: String,
}

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Multi-entry answers lose their middle markers; single texts succeed
    PartialMarkers,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Multi-entry answers lack the END marker; single texts succeed
    Truncated,
    /// Returns empty response
    Empty,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter shared between clones
    request_count: Arc<AtomicUsize>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&MockRequest) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            custom_response: None,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock whose batch answers miss markers
    pub fn partial_markers() -> Self {
        Self::new(MockBehavior::PartialMarkers)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that returns truncated batch answers
    pub fn truncated() -> Self {
        Self::new(MockBehavior::Truncated)
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a mock that waits before answering
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&MockRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Translate a request the way a well-behaved model would
    pub fn echo(text: &str) -> String {
        let entries = count_entries(text);
        if entries == 0 {
            return format!("{}{}", TRANSLATED_PREFIX, text);
        }
        match decode_entries(text, entries) {
            Ok(texts) => Self::generate_batch_response(&texts),
            Err(_) => format!("{}{}", TRANSLATED_PREFIX, text),
        }
    }

    /// Generate a properly formatted batch response with markers
    pub fn generate_batch_response<S: AsRef<str>>(entries: &[S]) -> String {
        let translated: Vec<String> = entries
            .iter()
            .map(|entry| format!("{}{}", TRANSLATED_PREFIX, entry.as_ref()))
            .collect();
        encode_entries(&translated)
    }

    /// Generate a response with the middle markers missing
    pub fn generate_partial_response<S: AsRef<str>>(entries: &[S]) -> String {
        let mut response = String::new();
        for (i, entry) in entries.iter().enumerate() {
            if i == 0 || i == entries.len() - 1 {
                response.push_str(&format!("<<ENTRY_{}>>\n", i));
            }
            response.push_str(&format!("{}{}\n", TRANSLATED_PREFIX, entry.as_ref()));
        }
        response.push_str(END_MARKER);
        response
    }

    /// Generate a truncated response (no END marker)
    pub fn generate_truncated_response<S: AsRef<str>>(entries: &[S]) -> String {
        let full = Self::generate_batch_response(entries);
        full.trim_end_matches(END_MARKER).to_string()
    }

    fn batch_entries(text: &str) -> Option<Vec<String>> {
        let count = count_entries(text);
        (count > 1).then(|| decode_entries(text, count).ok()).flatten()
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
            custom_response: self.custom_response,
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    type Request = MockRequest;
    type Response = MockResponse;

    fn build_request(&self, system_prompt: &str, text: &str) -> Self::Request {
        MockRequest {
            system_prompt: system_prompt.to_string(),
            text: text.to_string(),
        }
    }

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        let text = match self.behavior {
            MockBehavior::Working => match self.custom_response {
                Some(generator) => generator(&request),
                None => Self::echo(&request.text),
            },

            MockBehavior::PartialMarkers => match Self::batch_entries(&request.text) {
                Some(entries) => Self::generate_partial_response(&entries),
                None => Self::echo(&request.text),
            },

            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == fail_every - 1 {
                    return Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    });
                }
                Self::echo(&request.text)
            }

            MockBehavior::Failing => {
                return Err(ProviderError::ApiError {
                    message: "Simulated provider failure".to_string(),
                    status_code: 500,
                });
            }

            MockBehavior::Truncated => match Self::batch_entries(&request.text) {
                Some(entries) => Self::generate_truncated_response(&entries),
                None => Self::echo(&request.text),
            },

            MockBehavior::Empty => String::new(),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Self::echo(&request.text)
            }
        };

        Ok(MockResponse { text })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Simulated connection failure".to_string())),
            _ => Ok(()),
        }
    }

    fn extract_text(response: &Self::Response) -> String {
        response.text.clone()
    }
}
