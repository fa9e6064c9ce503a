/*!
 * Core translation service implementation.
 *
 * [`TranslationService`] turns a [`Provider`] into a [`TextTransformer`]. A
 * batch is cut into chunks that fit the provider's request budget, each chunk
 * travels as one marker-delimited prompt, and the chunks are sent
 * concurrently and put back in order. A chunk whose markers come back broken
 * is retried one entry at a time.
 */

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, warn};
use std::time::Instant;
use url::Url;

use super::markers::{decode_entries, encode_entries};
use super::transformer::{PassthroughTransformer, TextTransformer};
use crate::app_config::{Config, TranslationProvider};
use crate::errors::TranslationError;
use crate::providers::Provider;
use crate::providers::anthropic::Anthropic;
use crate::providers::ollama::Ollama;

/// Instructions appended to the system prompt for batch requests
const BATCH_INSTRUCTIONS: &str = "The input contains several numbered entries, each introduced by a marker \
     such as <<ENTRY_0>> and the whole block closed by <<END>>. Translate the text of every entry \
     separately. Reply with exactly the same markers in the same order, each followed by its \
     translation, and finish with <<END>>. Do not merge, split, skip or explain entries.";

/// Instructions appended to the system prompt for single texts
const SINGLE_INSTRUCTIONS: &str = "Only respond with the translated text, without any explanations or notes.";

/// Parse an endpoint string into host and port
pub fn parse_endpoint(endpoint: &str) -> Result<(String, u16)> {
    if endpoint.is_empty() {
        return Err(anyhow!("Endpoint cannot be empty"));
    }

    let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Url::parse(endpoint)?
    } else {
        Url::parse(&format!("http://{}", endpoint))?
    };

    let host = url.host_str()
        .ok_or_else(|| anyhow!("Invalid host in endpoint: {}", endpoint))?
        .to_string();

    let port = url.port().unwrap_or(if url.scheme() == "https" { 443 } else { 80 });

    Ok((format!("{}://{}", url.scheme(), host), port))
}

/// Translation options for customizing the translation process
#[derive(Debug, Clone)]
pub struct TranslationOptions {
    /// Upper bound on fragment characters in one request
    pub max_chars_per_request: usize,

    /// Maximum number of chunks in flight
    pub max_concurrent_requests: usize,

    /// Whether to retry individual entries when a chunk answer is malformed
    pub retry_individual_entries: bool,
}

impl Default for TranslationOptions {
    fn default() -> Self {
        Self {
            max_chars_per_request: 1000,
            max_concurrent_requests: 3,
            retry_individual_entries: true,
        }
    }
}

/// LLM-backed transformation service
#[derive(Debug)]
pub struct TranslationService<P: Provider> {
    /// Provider implementation
    provider: P,

    /// Translation options
    pub options: TranslationOptions,

    /// System prompt for batch requests
    batch_prompt: String,

    /// System prompt for single texts
    single_prompt: String,
}

impl<P: Provider> TranslationService<P> {
    /// Create a service around `provider` with a filled-in system prompt
    pub fn new(provider: P, system_prompt: &str, options: TranslationOptions) -> Self {
        Self {
            provider,
            options,
            batch_prompt: format!("{} {}", system_prompt, BATCH_INSTRUCTIONS),
            single_prompt: format!("{} {}", system_prompt, SINGLE_INSTRUCTIONS),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Cut a batch into chunks of at most `max_chars_per_request` characters
    ///
    /// A single text longer than the budget gets a chunk of its own.
    pub fn chunk(&self, texts: &[String]) -> Vec<Vec<String>> {
        let budget = self.options.max_chars_per_request.max(1);
        let mut chunks: Vec<Vec<String>> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_chars = 0;

        for text in texts {
            let chars = text.chars().count();
            if !current.is_empty() && current_chars + chars > budget {
                chunks.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            current.push(text.clone());
            current_chars += chars;
        }
        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }

    /// Translate one chunk with a single request
    async fn translate_chunk(&self, chunk: &[String]) -> Result<Vec<String>, TranslationError> {
        if let [single] = chunk {
            return Ok(vec![self.translate_single(single).await?]);
        }

        let request = self.provider.build_request(&self.batch_prompt, &encode_entries(chunk));
        let response = self.provider.complete(request).await?;
        let answer = P::extract_text(&response);

        match decode_entries(&answer, chunk.len()) {
            Ok(entries) => Ok(entries),
            Err(e) if self.options.retry_individual_entries => {
                warn!("Batch of {} entries came back malformed ({}), retrying entries one by one", chunk.len(), e);
                let mut entries = Vec::with_capacity(chunk.len());
                for text in chunk {
                    entries.push(self.translate_single(text).await?);
                }
                Ok(entries)
            }
            Err(e) => Err(e),
        }
    }

    /// Translate one text without markers
    async fn translate_single(&self, text: &str) -> Result<String, TranslationError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let request = self.provider.build_request(&self.single_prompt, text);
        let response = self.provider.complete(request).await?;
        let translated = P::extract_text(&response).trim().to_string();

        if translated.is_empty() {
            return Err(TranslationError::MalformedResponse(format!(
                "empty translation for a {}-character text",
                text.chars().count()
            )));
        }

        Ok(translated)
    }
}

#[async_trait]
impl<P: Provider> TextTransformer for TranslationService<P> {
    async fn transform(&self, texts: Vec<String>) -> Result<Vec<String>, TranslationError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let start_time = Instant::now();
        let chunks = self.chunk(&texts);
        let chunk_count = chunks.len();

        let mut results = stream::iter(chunks.into_iter().enumerate())
            .map(|(index, chunk)| async move { (index, self.translate_chunk(&chunk).await) })
            .buffer_unordered(self.options.max_concurrent_requests.max(1))
            .collect::<Vec<_>>()
            .await;

        results.sort_by_key(|(index, _)| *index);

        let mut translated = Vec::with_capacity(texts.len());
        for (_, result) in results {
            translated.extend(result?);
        }

        debug!(
            "Translated {} texts in {} chunk(s) in {:?}",
            texts.len(),
            chunk_count,
            start_time.elapsed()
        );

        Ok(translated)
    }

    async fn test_connection(&self) -> Result<(), TranslationError> {
        self.provider.test_connection().await.map_err(TranslationError::from)
    }

    fn name(&self) -> &str {
        "translation service"
    }
}

/// Build the transformer the configuration asks for
pub fn transformer_from_config(config: &Config) -> Result<Box<dyn TextTransformer>> {
    let translation = &config.translation;
    if translation.provider == TranslationProvider::Passthrough {
        return Ok(Box::new(PassthroughTransformer));
    }

    let system_prompt = config.system_prompt()?;
    let options = TranslationOptions {
        max_chars_per_request: translation.get_max_chars_per_request(),
        max_concurrent_requests: translation.get_concurrent_requests(),
        retry_individual_entries: true,
    };
    let temperature = translation.common.temperature;

    let transformer: Box<dyn TextTransformer> = match translation.provider {
        TranslationProvider::Ollama => {
            let (host, port) = parse_endpoint(&translation.get_endpoint())?;
            let client = Ollama::new(
                host,
                port,
                translation.get_model(),
                temperature,
                translation.get_timeout(),
                translation.retry_policy(),
            );
            Box::new(TranslationService::new(client, &system_prompt, options))
        }
        TranslationProvider::Anthropic => {
            let client = Anthropic::new(
                translation.get_api_key(),
                translation.get_endpoint(),
                translation.get_model(),
                temperature,
                translation.get_timeout(),
                translation.retry_policy(),
            );
            Box::new(TranslationService::new(client, &system_prompt, options))
        }
        TranslationProvider::Passthrough => Box::new(PassthroughTransformer),
    };

    Ok(transformer)
}
