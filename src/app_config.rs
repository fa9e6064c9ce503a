use anyhow::{Context, Result, anyhow};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dataset::{RecordFormat, RecordSchema};
use crate::providers::RetryPolicy;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Translation config
    pub translation: TranslationConfig,

    /// Dataset locations and layout
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Episode pipeline settings
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Ollama
    #[default]
    Ollama,
    // @provider: Anthropic
    Anthropic,
    // @provider: Identity transform, no model involved
    Passthrough,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::Anthropic => "Anthropic",
            Self::Passthrough => "Passthrough",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::Passthrough => "passthrough".to_string(),
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "anthropic" => Ok(Self::Anthropic),
            "passthrough" => Ok(Self::Passthrough),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Max concurrent requests per batch
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    // @field: Max fragment characters per request
    #[serde(default = "default_max_chars_per_request")]
    pub max_chars_per_request: usize,

    // @field: HTTP timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Rate limit (requests per minute)
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        match provider_type {
            TranslationProvider::Ollama => Self {
                provider_type: "ollama".to_string(),
                model: default_ollama_model(),
                api_key: String::new(),
                endpoint: default_ollama_endpoint(),
                concurrent_requests: default_concurrent_requests(),
                max_chars_per_request: default_max_chars_per_request(),
                timeout_secs: default_timeout_secs(),
                rate_limit: None,
            },
            TranslationProvider::Anthropic => Self {
                provider_type: "anthropic".to_string(),
                model: default_anthropic_model(),
                api_key: String::new(),
                endpoint: default_anthropic_endpoint(),
                concurrent_requests: default_concurrent_requests(),
                max_chars_per_request: default_anthropic_max_chars_per_request(),
                timeout_secs: default_anthropic_timeout_secs(),
                rate_limit: default_anthropic_rate_limit(),
            },
            TranslationProvider::Passthrough => Self {
                provider_type: "passthrough".to_string(),
                model: String::new(),
                api_key: String::new(),
                endpoint: String::new(),
                concurrent_requests: 1,
                max_chars_per_request: default_max_chars_per_request(),
                timeout_secs: default_timeout_secs(),
                rate_limit: None,
            },
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// System prompt template for translation
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Retry count for failed requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff multiplier for retries (in milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            temperature: default_temperature(),
        }
    }
}

/// Where the dataset lives and how its records are laid out
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatasetConfig {
    /// Directory holding `<split>.csv` source files
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Directory the translated splits are built into
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Split names to build; empty means every `*.csv` file in `input_dir`
    #[serde(default = "default_splits")]
    pub splits: Vec<String>,

    /// Build version recorded in the marker file
    #[serde(default = "default_version")]
    pub version: String,

    /// Delimiter conventions
    #[serde(default)]
    pub format: RecordFormat,

    /// Field layout
    #[serde(default)]
    pub schema: RecordSchema,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            splits: default_splits(),
            version: default_version(),
            format: RecordFormat::default(),
            schema: RecordSchema::default(),
        }
    }
}

impl DatasetConfig {
    /// Source file of a split
    pub fn input_file(&self, split: &str) -> PathBuf {
        self.input_dir.join(format!("{}.csv", split))
    }
}

/// Episode pipeline settings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PipelineSettings {
    /// Collect the next episode while the current one is being transformed
    #[serde(default)]
    pub pipelined: bool,

    /// Upper bound for one transformation call, in seconds
    #[serde(default)]
    pub transform_timeout_secs: Option<u64>,
}

impl PipelineSettings {
    pub fn transform_timeout(&self) -> Option<Duration> {
        self.transform_timeout_secs.filter(|secs| *secs > 0).map(Duration::from_secs)
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

fn default_concurrent_requests() -> usize {
    4
}

fn default_max_chars_per_request() -> usize {
    1000
}

fn default_anthropic_max_chars_per_request() -> usize {
    8000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_anthropic_timeout_secs() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_temperature() -> f32 {
    0.3
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_anthropic_rate_limit() -> Option<u32> {
    // Anthropic's standard limit is 50 requests per minute
    Some(45)
}

fn default_system_prompt() -> String {
    "You are a professional translator. Translate the following dialogue text from {source_language} to {target_language}. Keep the meaning, tone and register of each line.".to_string()
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("data/empatheticdialogues")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/empatheticdialogues_translated")
}

fn default_splits() -> Vec<String> {
    vec!["train".to_string(), "valid".to_string(), "test".to_string()]
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Config {
    /// Load a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;

        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;

        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let _source_name = crate::language_utils::get_language_name(&self.source_language)?;
        let _target_name = crate::language_utils::get_language_name(&self.target_language)?;

        if self.translation.provider == TranslationProvider::Anthropic
            && self.translation.get_api_key().is_empty()
        {
            return Err(anyhow!("Translation API key is required for Anthropic provider"));
        }

        if self.dataset.version.trim().is_empty() {
            return Err(anyhow!("Dataset version cannot be empty"));
        }
        if self.dataset.input_dir == self.dataset.output_dir {
            return Err(anyhow!("Dataset input and output directories must differ"));
        }
        if self.dataset.splits.iter().any(|split| split.trim().is_empty()) {
            return Err(anyhow!("Split names cannot be empty"));
        }

        self.dataset.format.validate().context("Invalid record format")?;
        self.dataset.schema.validate().context("Invalid record schema")?;

        Ok(())
    }

    /// Fill the prompt template with language names
    pub fn system_prompt(&self) -> Result<String> {
        let source = crate::language_utils::get_language_name(&self.source_language)?;
        let target = crate::language_utils::get_language_name(&self.target_language)?;

        Ok(self.translation.common.system_prompt
            .replace("{source_language}", &source)
            .replace("{target_language}", &target))
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "ru".to_string(),
            translation: TranslationConfig::default(),
            dataset: DatasetConfig::default(),
            pipeline: PipelineSettings::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        let provider_str = self.provider.to_lowercase_string();
        self.available_providers.iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Mutable access to the active provider configuration, created when missing
    pub fn active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider_str = self.provider.to_lowercase_string();
        match self.available_providers.iter().position(|p| p.provider_type == provider_str) {
            Some(index) => &mut self.available_providers[index],
            None => {
                self.available_providers.push(ProviderConfig::new(self.provider));
                let last = self.available_providers.len() - 1;
                &mut self.available_providers[last]
            }
        }
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        match self.provider {
            TranslationProvider::Ollama => default_ollama_model(),
            TranslationProvider::Anthropic => default_anthropic_model(),
            TranslationProvider::Passthrough => String::new(),
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        match self.provider {
            TranslationProvider::Ollama => default_ollama_endpoint(),
            TranslationProvider::Anthropic => default_anthropic_endpoint(),
            TranslationProvider::Passthrough => String::new(),
        }
    }

    /// Get the max chars per request for the active provider
    pub fn get_max_chars_per_request(&self) -> usize {
        self.get_active_provider_config()
            .map(|p| p.max_chars_per_request)
            .filter(|chars| *chars > 0)
            .unwrap_or_else(default_max_chars_per_request)
    }

    /// Get the number of concurrent requests for the active provider
    pub fn get_concurrent_requests(&self) -> usize {
        self.get_active_provider_config()
            .map(|p| p.concurrent_requests)
            .filter(|n| *n > 0)
            .unwrap_or_else(default_concurrent_requests)
    }

    /// Get the HTTP timeout for the active provider
    pub fn get_timeout(&self) -> Duration {
        let secs = self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .filter(|secs| *secs > 0)
            .unwrap_or_else(default_timeout_secs);
        Duration::from_secs(secs)
    }

    /// Get the rate limit for the active provider
    pub fn get_rate_limit(&self) -> Option<u32> {
        match self.get_active_provider_config() {
            Some(provider_config) => provider_config.rate_limit,
            None if self.provider == TranslationProvider::Anthropic => default_anthropic_rate_limit(),
            None => None,
        }
    }

    /// Retry settings for the active provider
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.common.retry_count,
            backoff_base_ms: self.common.retry_backoff_ms,
            rate_limit: self.get_rate_limit(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Ollama),
                ProviderConfig::new(TranslationProvider::Anthropic),
                ProviderConfig::new(TranslationProvider::Passthrough),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
