/*!
 * Batch transform invocation.
 *
 * One call per episode: the distinct fragment texts go to the transformer in
 * map order, and the answer is checked for length before anything is written
 * back. There is no retry or fallback at this level; any failure is fatal.
 */

use std::time::Duration;

use log::debug;

use super::collector::FragmentMap;
use super::transformer::TextTransformer;
use crate::errors::TranslationError;

/// Sends one episode's fragments to the transformer
pub struct BatchInvoker<'a> {
    transformer: &'a dyn TextTransformer,
    timeout: Option<Duration>,
}

impl<'a> BatchInvoker<'a> {
    pub fn new(transformer: &'a dyn TextTransformer) -> Self {
        Self {
            transformer,
            timeout: None,
        }
    }

    /// Bound each call by `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Transform every fragment of the map
    ///
    /// An empty map returns an empty result without calling the service.
    pub async fn invoke(&self, fragments: &FragmentMap) -> Result<Vec<String>, TranslationError> {
        if fragments.is_empty() {
            return Ok(Vec::new());
        }

        let texts = fragments.texts();
        let expected = texts.len();
        debug!("Sending {} fragments to {}", expected, self.transformer.name());

        let call = self.transformer.transform(texts);
        let results = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| TranslationError::Timeout(limit))??,
            None => call.await?,
        };

        if results.len() != expected {
            return Err(TranslationError::LengthMismatch {
                expected,
                received: results.len(),
            });
        }

        Ok(results)
    }

    /// Whether this invoker would call the service for `fragments`
    pub fn needs_call(fragments: &FragmentMap) -> bool {
        !fragments.is_empty()
    }
}
