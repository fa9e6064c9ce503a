/*!
 * Error types for the dialogue-transcoder application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 *
 * Every error here is fatal to the current run: a run that hits one of them
 * leaves no committed output and no build marker behind.
 */

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Errors raised by the dataset side of the pipeline: parsing, episode
/// segmentation and reassembly bookkeeping
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    /// A row whose field count is outside the schema's accepted range
    #[error("Malformed record at line {line}: expected {min} to {max} fields, found {found}")]
    MalformedRecord {
        /// 1-based line number in the input file
        line: usize,
        /// Number of fields actually found
        found: usize,
        /// Smallest accepted arity
        min: usize,
        /// Largest accepted arity
        max: usize,
    },

    /// A turn index that does not continue the current episode
    #[error("Turn sequence broken at line {line} in episode '{episode_id}': expected turn {expected}, found '{found}'")]
    TurnSequence {
        /// 1-based line number in the input file
        line: usize,
        /// Episode id shared with the previous row
        episode_id: String,
        /// Turn index that should have appeared
        expected: u32,
        /// Raw value found in the turn field
        found: String,
    },

    /// A recorded write-back position that never received a value
    #[error("Incomplete reassembly: record {record}, field {field}, slot {slot:?} was never filled")]
    IncompletePosition {
        /// Record index within the episode
        record: usize,
        /// Field index within the record
        field: usize,
        /// Sub-value index for multi-value fields
        slot: Option<usize>,
    },

    /// A transformed value that would split its row across several lines
    #[error("Line break in transformed value for record {record}, field {field}, slot {slot:?}")]
    LineBreak {
        /// Record index within the episode
        record: usize,
        /// Field index within the record
        field: usize,
        /// Sub-value index for multi-value fields
        slot: Option<usize>,
    },
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The service answered with a result list of the wrong size
    #[error("Transformation returned {received} results for {expected} inputs")]
    LengthMismatch {
        /// Number of fragments submitted
        expected: usize,
        /// Number of results received
        received: usize,
    },

    /// The service did not answer within the configured timeout
    #[error("Transformation timed out after {0:?}")]
    Timeout(Duration),

    /// The provider answered but the batch markers could not be recovered
    #[error("Malformed batch response: {0}")]
    MalformedResponse(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from dataset processing
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
