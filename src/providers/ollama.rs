use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Provider, RetryPolicy, status_error, transport_error};
use crate::errors::ProviderError;

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
    /// Model used for every generation
    model: String,
    /// Sampling temperature
    temperature: f32,
    /// Retry and pacing settings
    retry: RetryPolicy,
}

/// Generate request for the Ollama API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// System message to guide the model
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Generation options for the Ollama API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for generation (default: 0.8)
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: String,
    /// Generated text
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
    /// Number of prompt tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    /// Number of generated tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

impl GenerationRequest {
    /// Create a new non-streaming generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            options: None,
            stream: Some(false),
        }
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).temperature = Some(temperature);
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// Build the base URL from an endpoint that may lack a scheme or a port
fn base_url_from(host: &str, port: u16) -> String {
    match host.split_once("://") {
        Some((scheme, rest)) if rest.contains(':') => format!("{}://{}", scheme, rest.trim_end_matches('/')),
        Some((scheme, rest)) => format!("{}://{}:{}", scheme, rest.trim_end_matches('/'), port),
        None => format!("http://{}:{}", host, port),
    }
}

impl Ollama {
    /// Create a new Ollama client
    ///
    /// Ollama speaks HTTP/1.1; connections are pooled so concurrent chunks
    /// of one batch reuse them.
    pub fn new(
        host: impl AsRef<str>,
        port: u16,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            base_url: base_url_from(host.as_ref(), port),
            client: Client::builder()
                .timeout(timeout)
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .pool_max_idle_per_host(20)
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            model: model.into(),
            temperature,
            retry,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate text from the Ollama API with retry logic
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let request = &request;
        self.retry.run("Ollama", move || self.send_generate(request)).await
    }

    async fn send_generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self.client.post(&url)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Ollama API error ({}): {}", status, error_text);
            return Err(status_error(status.as_u16(), error_text));
        }

        let response_text = response.text().await
            .map_err(|e| ProviderError::ParseError(format!("Failed to read Ollama response: {}", e)))?;

        parse_generation_response(&response_text)
    }

    /// Get the Ollama API version
    pub async fn version(&self) -> Result<String, ProviderError> {
        let url = format!("{}/api/version", self.base_url);
        let response: serde_json::Value = self.client.get(&url)
            .send()
            .await
            .map_err(transport_error)?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse Ollama version response: {}", e)))?;

        response["version"].as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::ParseError("Invalid version format in response".to_string()))
    }
}

/// Parse a generate answer
///
/// A single JSON object is expected, but servers that ignore `stream: false`
/// answer with JSON lines; their `response` pieces are concatenated.
pub fn parse_generation_response(response_text: &str) -> Result<GenerationResponse, ProviderError> {
    if let Ok(parsed) = serde_json::from_str::<GenerationResponse>(response_text) {
        return Ok(parsed);
    }

    debug!("Ollama answer is not a single JSON object, trying JSON lines");
    let mut combined: Option<GenerationResponse> = None;
    for line in response_text.lines().filter(|line| !line.trim().is_empty()) {
        let piece = serde_json::from_str::<GenerationResponse>(line).map_err(|e| {
            let preview: String = response_text.chars().take(500).collect();
            ProviderError::ParseError(format!("Failed to parse Ollama API response: {}. Raw response: {}", e, preview))
        })?;
        match combined.as_mut() {
            Some(acc) => {
                acc.response.push_str(&piece.response);
                acc.done = piece.done;
                acc.prompt_eval_count = piece.prompt_eval_count.or(acc.prompt_eval_count);
                acc.eval_count = piece.eval_count.or(acc.eval_count);
            }
            None => combined = Some(piece),
        }
    }

    combined.ok_or_else(|| ProviderError::ParseError("Empty response from Ollama API".to_string()))
}

#[async_trait]
impl Provider for Ollama {
    type Request = GenerationRequest;
    type Response = GenerationResponse;

    fn build_request(&self, system_prompt: &str, text: &str) -> Self::Request {
        GenerationRequest::new(self.model.clone(), text)
            .system(system_prompt)
            .temperature(self.temperature)
    }

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        self.generate(request).await
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let version = self.version().await?;
        debug!("Connected to Ollama {} at {}", version, self.base_url);
        Ok(())
    }

    fn extract_text(response: &Self::Response) -> String {
        response.response.clone()
    }
}
