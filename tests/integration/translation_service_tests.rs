/*!
 * Integration tests for the LLM-backed transformer driven by the pipeline
 */

use std::io::Cursor;
use std::time::Duration;

use dialogue_transcoder::dataset::{RecordFormat, RecordSchema};
use dialogue_transcoder::errors::{AppError, TranslationError};
use dialogue_transcoder::pipeline::{EpisodePipeline, PipelineOptions};
use dialogue_transcoder::providers::mock::{MockProvider, MockRequest, TRANSLATED_PREFIX};
use dialogue_transcoder::translation::{TextTransformer, TranslationOptions, TranslationService};

use crate::common::{SAMPLE_SPLIT, row, split_body};

fn service(provider: MockProvider, max_chars_per_request: usize) -> TranslationService<MockProvider> {
    TranslationService::new(
        provider,
        "You are a professional translator. Translate from English to Russian.",
        TranslationOptions {
            max_chars_per_request,
            max_concurrent_requests: 3,
            retry_individual_entries: true,
        },
    )
}

async fn translate_split(transformer: &dyn TextTransformer, input: &str) -> (Result<(), AppError>, String) {
    let schema = RecordSchema::default();
    let format = RecordFormat::default();
    let pipeline = EpisodePipeline::new(transformer, &schema, &format).with_options(PipelineOptions {
        pipelined: true,
        transform_timeout: None,
    });

    let mut output = Vec::new();
    let result = pipeline
        .run(Cursor::new(input.to_string()), &mut output, |_| {})
        .await
        .map(|_| ());
    (result, String::from_utf8(output).unwrap())
}

/// Every text field is translated and every other field is left alone
#[tokio::test]
async fn test_translationService_withWorkingProvider_shouldTranslateTextFieldsOnly() {
    let service = service(MockProvider::working(), 4000);

    let (result, output) = translate_split(&service, SAMPLE_SPLIT).await;
    result.unwrap();

    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], SAMPLE_SPLIT.lines().next().unwrap());

    let fields: Vec<&str> = lines[2].split(',').collect();
    assert_eq!(fields[0], "hit:0_conv:1");
    assert_eq!(fields[1], "2");
    assert_eq!(fields[2], "sentimental");
    assert_eq!(
        fields[3],
        "[TRANSLATED] I remember going to the fireworks with my best friend_comma_ it was great."
    );
    assert_eq!(fields[5], "[TRANSLATED] Was this a friend you were in love with?");
    assert_eq!(fields[6], "5|5|5_2|2|5");
    assert_eq!(
        fields[8],
        "[TRANSLATED] Yes|[TRANSLATED] No|[TRANSLATED] Was this a friend you were in love with?"
    );

    // one batch request per episode
    assert_eq!(service.provider().request_count(), 2);
}

/// Small request budgets split an episode into several requests without changing the result
#[tokio::test]
async fn test_translationService_withSmallBudget_shouldKeepEpisodeOrder() {
    let roomy = service(MockProvider::working(), 4000);
    let tight = service(MockProvider::working(), 40);

    let (roomy_result, roomy_output) = translate_split(&roomy, SAMPLE_SPLIT).await;
    let (tight_result, tight_output) = translate_split(&tight, SAMPLE_SPLIT).await;
    roomy_result.unwrap();
    tight_result.unwrap();

    assert_eq!(roomy_output, tight_output);
    assert!(tight.provider().request_count() > roomy.provider().request_count());
}

/// Broken batch markers fall back to one request per entry
#[tokio::test]
async fn test_translationService_withBrokenMarkers_shouldStillTranslateEverything() {
    let service = service(MockProvider::partial_markers(), 4000);

    let (result, output) = translate_split(&service, SAMPLE_SPLIT).await;
    result.unwrap();

    let translated_prompt = format!("{}It feels like hitting to blank wall.", TRANSLATED_PREFIX);
    assert!(output.contains(&translated_prompt));
    assert!(!output.contains("<<ENTRY_"));
}

/// A provider failure aborts the run after the episodes already written
#[tokio::test]
async fn test_translationService_withIntermittentProvider_shouldAbortOnFailure() {
    let service = service(MockProvider::intermittent(2), 4000);

    let (result, output) = translate_split(&service, SAMPLE_SPLIT).await;

    assert!(matches!(result, Err(AppError::Translation(TranslationError::Provider(_)))));
    assert_eq!(output.lines().count(), 3);
}

/// A provider slower than the pipeline timeout aborts the run after the header
#[tokio::test]
async fn test_translationService_withSlowProvider_shouldTimeOut() {
    let service = service(MockProvider::slow(2000), 4000);
    let schema = RecordSchema::default();
    let format = RecordFormat::default();
    let pipeline = EpisodePipeline::new(&service, &schema, &format).with_options(PipelineOptions {
        pipelined: false,
        transform_timeout: Some(Duration::from_millis(50)),
    });

    let mut output = Vec::new();
    let result = pipeline.run(Cursor::new(SAMPLE_SPLIT.to_string()), &mut output, |_| {}).await;

    assert!(matches!(result, Err(AppError::Translation(TranslationError::Timeout(_)))));
    assert_eq!(String::from_utf8(output).unwrap().lines().count(), 1);
}

/// The model's answer is used as-is, delimiters in it get escaped
#[tokio::test]
async fn test_translationService_withDelimitersInAnswer_shouldEscapeThem() {
    fn answer(_request: &MockRequest) -> String {
        "oh, well|maybe".to_string()
    }
    let service = service(MockProvider::working().with_custom_response(answer), 4000);
    let input = split_body(&[row(&["e", "1", "c", "p", "0", "", "s", "t", "x"])]);

    let (result, output) = translate_split(&service, &input).await;
    result.unwrap();

    assert_eq!(
        output,
        split_body(&[row(&["e", "1", "c", "oh_comma_ well|maybe", "0", "", "s", "t", "oh_comma_ well_pipe_maybe"])])
    );
}

/// An empty answer is an error, never the untranslated text
#[tokio::test]
async fn test_translationService_withEmptyAnswers_shouldFail() {
    let service = service(MockProvider::empty(), 4000);
    let input = split_body(&[row(&["e", "1", "c", "p", "0", "p", "s", "t"])]);

    let (result, output) = translate_split(&service, &input).await;

    assert!(matches!(
        result,
        Err(AppError::Translation(TranslationError::MalformedResponse(_)))
    ));
    assert_eq!(output.lines().count(), 1);
}
