/*!
 * Tests for error types and conversions
 */

use std::time::Duration;
use dialogue_transcoder::errors::{AppError, DatasetError, ProviderError, TranslationError};

#[test]
fn test_providerError_apiError_shouldDisplayStatusAndMessage() {
    let error = ProviderError::ApiError {
        status_code: 429,
        message: "Too many requests".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("429"));
    assert!(display.contains("Too many requests"));
}

#[test]
fn test_datasetError_malformedRecord_shouldDisplayLineAndArity() {
    let error = DatasetError::MalformedRecord { line: 12, found: 7, min: 8, max: 9 };
    let display = error.to_string();
    assert!(display.contains("line 12"));
    assert!(display.contains("found 7"));
    assert!(display.contains("8 to 9"));
}

#[test]
fn test_datasetError_turnSequence_shouldDisplayEpisodeAndTurns() {
    let error = DatasetError::TurnSequence {
        line: 4,
        episode_id: "hit:3_conv:6".to_string(),
        expected: 2,
        found: "3".to_string(),
    };
    let display = error.to_string();
    assert!(display.contains("hit:3_conv:6"));
    assert!(display.contains("expected turn 2"));
    assert!(display.contains("'3'"));
}

#[test]
fn test_datasetError_lineBreak_shouldDisplayPosition() {
    let error = DatasetError::LineBreak { record: 2, field: 5, slot: None };
    assert_eq!(
        error.to_string(),
        "Line break in transformed value for record 2, field 5, slot None"
    );
}

#[test]
fn test_translationError_lengthMismatch_shouldDisplayCounts() {
    let error = TranslationError::LengthMismatch { expected: 5, received: 4 };
    assert_eq!(error.to_string(), "Transformation returned 4 results for 5 inputs");
}

#[test]
fn test_translationError_fromProviderError_shouldWrap() {
    let error: TranslationError = ProviderError::ConnectionError("refused".to_string()).into();
    assert!(matches!(error, TranslationError::Provider(ProviderError::ConnectionError(_))));
    assert!(error.to_string().contains("refused"));
}

#[test]
fn test_appError_conversions_shouldPickMatchingVariant() {
    let dataset: AppError = DatasetError::IncompletePosition { record: 0, field: 8, slot: Some(1) }.into();
    assert!(matches!(dataset, AppError::Dataset(_)));

    let translation: AppError = TranslationError::Timeout(Duration::from_secs(3)).into();
    assert!(matches!(translation, AppError::Translation(TranslationError::Timeout(_))));

    let io: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
    assert!(matches!(io, AppError::File(_)));

    let other: AppError = anyhow::anyhow!("something else").into();
    assert!(matches!(other, AppError::Unknown(_)));
}
