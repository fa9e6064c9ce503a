/*!
 * The transformation service seam.
 *
 * The pipeline only ever talks to a [`TextTransformer`]: an ordered list of
 * texts goes in, a list of the same length comes out, result `i` belonging
 * to input `i`.
 */

use async_trait::async_trait;

use crate::errors::TranslationError;

/// Batch text transformation service
#[async_trait]
pub trait TextTransformer: Send + Sync {
    /// Transform every text of the batch
    ///
    /// Implementations must return exactly one result per input, in input
    /// order, and must not merge identical inputs.
    async fn transform(&self, texts: Vec<String>) -> Result<Vec<String>, TranslationError>;

    /// Check the service is reachable
    async fn test_connection(&self) -> Result<(), TranslationError> {
        Ok(())
    }

    /// Short name for log messages
    fn name(&self) -> &str;
}

/// Identity transformer
///
/// Returns its input unchanged. Running a build with it checks the
/// escaping round trip on real data without a model.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTransformer;

#[async_trait]
impl TextTransformer for PassthroughTransformer {
    async fn transform(&self, texts: Vec<String>) -> Result<Vec<String>, TranslationError> {
        Ok(texts)
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}
