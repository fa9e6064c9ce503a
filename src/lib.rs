/*!
 * # dialogue-transcoder
 *
 * Episode-scoped translation of delimited dialogue datasets such as
 * EmpatheticDialogues.
 *
 * ## Features
 *
 * - Rows are grouped into episodes by id and validated turn sequence
 * - Every distinct text of an episode is translated exactly once, in one batch
 * - Escaped delimiters (`_comma_`, `_pipe_`) survive the round trip
 * - Multi-value candidate fields are split, translated and re-joined in order
 * - Translation through an LLM provider:
 *   - Ollama (local LLM)
 *   - Anthropic API
 *   - or an identity pass for checking the escaping on real data
 * - Idempotent builds guarded by a version marker
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `dataset`: Record parsing, episode segmentation and output
 * - `translation`: Fragment collection, batching, reassembly and the LLM service:
 *   - `translation::collector`: Per-episode fragment dedup
 *   - `translation::batch`: One transformer call per episode
 *   - `translation::reassembly`: Write-back of results
 *   - `translation::core`: LLM-backed transformer
 * - `pipeline`: The per-split driver
 * - `build_gate`: Idempotency marker and staged output
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `providers`: Client implementations for LLM providers:
 *   - `providers::ollama`: Ollama API client
 *   - `providers::anthropic`: Anthropic API client
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod build_gate;
pub mod dataset;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod pipeline;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::Controller;
pub use build_gate::{BuildGate, GateOutcome};
pub use dataset::{Episode, EpisodeSegmenter, EpisodeWriter, FieldRole, Record, RecordFormat, RecordSchema};
pub use errors::{AppError, DatasetError, ProviderError, TranslationError};
pub use language_utils::{get_language_name, normalize_to_part2t};
pub use pipeline::{EpisodePipeline, PipelineOptions, PipelineStats};
pub use translation::{PassthroughTransformer, TextTransformer, TranslationService};
