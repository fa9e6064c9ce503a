/*!
 * Integration tests for the episode pipeline
 */

use std::io::Cursor;
use std::time::Duration;

use dialogue_transcoder::dataset::{RecordFormat, RecordSchema};
use dialogue_transcoder::errors::{AppError, DatasetError, TranslationError};
use dialogue_transcoder::pipeline::{EpisodePipeline, PipelineOptions, PipelineStats};
use dialogue_transcoder::translation::TextTransformer;

use crate::common::mock_transformers::{FailingTransformer, RecordingTransformer, ShortTransformer, SlowTransformer};
use crate::common::{SAMPLE_SPLIT, row, split_body, synthetic_split};

async fn run_pipeline(
    transformer: &dyn TextTransformer,
    input: &str,
    options: PipelineOptions,
) -> (Result<PipelineStats, AppError>, String) {
    let schema = RecordSchema::default();
    let format = RecordFormat::default();
    let pipeline = EpisodePipeline::new(transformer, &schema, &format).with_options(options);

    let mut output = Vec::new();
    let result = pipeline
        .run(Cursor::new(input.as_bytes().to_vec()), &mut output, |_| {})
        .await;
    (result, String::from_utf8(output).expect("output should be UTF-8"))
}

fn sequential() -> PipelineOptions {
    PipelineOptions::default()
}

fn pipelined() -> PipelineOptions {
    PipelineOptions {
        pipelined: true,
        transform_timeout: None,
    }
}

/// Text fields repeated inside an episode are sent once and all copies get the result
#[tokio::test]
async fn test_pipeline_withRepeatedPrompt_shouldSendItOnce() {
    let transformer = RecordingTransformer::suffix();

    let (result, output) = run_pipeline(&transformer, SAMPLE_SPLIT, sequential()).await;
    result.unwrap();

    let prompt = "I remember going to the fireworks with my best friend, it was great.";
    let first_batch = &transformer.batches()[0];
    assert_eq!(first_batch.iter().filter(|text| text.as_str() == prompt).count(), 1);

    let translated_prompt = "I remember going to the fireworks with my best friend_comma_ it was great._T";
    assert_eq!(output.matches(translated_prompt).count(), 2);
}

/// With a suffixing transformer every text position holds its own original plus the suffix
#[tokio::test]
async fn test_pipeline_withSuffixTransformer_shouldAlignResultsToPositions() {
    let transformer = RecordingTransformer::suffix();
    let input = split_body(&[
        row(&["e1", "1", "ctx", "p_comma_ one", "0", "u1", "s", "t"]),
        row(&["e1", "2", "ctx", "p_comma_ one", "1", "u2", "s", "t", "c_pipe_1|u1|c3"]),
    ]);

    let (result, output) = run_pipeline(&transformer, &input, sequential()).await;
    result.unwrap();

    let expected = split_body(&[
        row(&["e1", "1", "ctx", "p_comma_ one_T", "0", "u1_T", "s", "t"]),
        row(&["e1", "2", "ctx", "p_comma_ one_T", "1", "u2_T", "s", "t", "c_pipe_1_T|u1_T|c3_T"]),
    ]);
    assert_eq!(output, expected);
    assert_eq!(
        transformer.batches(),
        vec![vec!["p, one".to_string(), "u1".into(), "u2".into(), "c|1".into(), "c3".into()]]
    );
}

/// Escaped delimiters survive an identity transformation byte for byte
#[tokio::test]
async fn test_pipeline_withIdentity_shouldRoundTripEscapes() {
    for options in [sequential(), pipelined()] {
        let transformer = RecordingTransformer::identity();

        let (result, output) = run_pipeline(&transformer, SAMPLE_SPLIT, options).await;
        let stats = result.unwrap();

        assert_eq!(output, SAMPLE_SPLIT);
        assert_eq!(stats.episodes, 2);
        assert_eq!(stats.records, 3);
    }
}

/// Turn indices must count up from 1 within an episode
#[tokio::test]
async fn test_pipeline_withSkippedTurn_shouldFailWithTurnSequence() {
    let transformer = RecordingTransformer::identity();
    let broken = split_body(&[
        row(&["5", "1", "c", "p", "0", "u", "s", "t"]),
        row(&["5", "3", "c", "p", "1", "v", "s", "t"]),
    ]);

    let (result, _) = run_pipeline(&transformer, &broken, sequential()).await;

    match result {
        Err(AppError::Dataset(DatasetError::TurnSequence { line, episode_id, expected, found })) => {
            assert_eq!(line, 3);
            assert_eq!(episode_id, "5");
            assert_eq!(expected, 2);
            assert_eq!(found, "3");
        }
        other => panic!("expected a turn sequence error, got {:?}", other),
    }
    assert_eq!(transformer.call_count(), 0);

    let valid = split_body(&[
        row(&["5", "1", "c", "p", "0", "u", "s", "t"]),
        row(&["5", "2", "c", "p", "1", "v", "s", "t"]),
        row(&["5", "3", "c", "p", "0", "w", "s", "t"]),
    ]);
    let (result, _) = run_pipeline(&transformer, &valid, sequential()).await;
    assert_eq!(result.unwrap().episodes, 1);
}

/// Rows need eight or nine fields
#[tokio::test]
async fn test_pipeline_withWrongArity_shouldFailWithMalformedRecord() {
    let transformer = RecordingTransformer::identity();

    let seven = split_body(&[row(&["e", "1", "c", "p", "0", "u", "s"])]);
    let (result, _) = run_pipeline(&transformer, &seven, sequential()).await;
    assert!(matches!(
        result,
        Err(AppError::Dataset(DatasetError::MalformedRecord { line: 2, found: 7, min: 8, max: 9 }))
    ));

    let ten = split_body(&[row(&["e", "1", "c", "p", "0", "u", "s", "t", "x", "y"])]);
    let (result, _) = run_pipeline(&transformer, &ten, sequential()).await;
    assert!(matches!(
        result,
        Err(AppError::Dataset(DatasetError::MalformedRecord { found: 10, .. }))
    ));

    let valid = split_body(&[
        row(&["e", "1", "c", "p", "0", "u", "s", "t"]),
        row(&["e", "2", "c", "p", "1", "u", "s", "t", "x"]),
    ]);
    let (result, _) = run_pipeline(&transformer, &valid, sequential()).await;
    assert_eq!(result.unwrap().records, 2);
}

/// Candidate lists are translated value by value and re-joined in order
#[tokio::test]
async fn test_pipeline_withCandidates_shouldTranslateEachValueInPlace() {
    let input = split_body(&[row(&["e", "1", "c", "p", "0", "u", "s", "t", "a|b|b"])]);

    let identity = RecordingTransformer::identity();
    let (result, output) = run_pipeline(&identity, &input, sequential()).await;
    result.unwrap();
    assert_eq!(output, input);

    let bracket = RecordingTransformer::bracket();
    let (result, output) = run_pipeline(&bracket, &input, sequential()).await;
    let stats = result.unwrap();

    assert_eq!(
        output,
        split_body(&[row(&["e", "1", "c", "[p]", "0", "[u]", "s", "t", "[a]|[b]|[b]"])])
    );
    assert_eq!(bracket.batches(), vec![vec!["p".to_string(), "u".into(), "a".into(), "b".into()]]);
    assert_eq!(stats.fragments, 4);
    assert_eq!(stats.positions, 5);
}

/// The same text in an utterance and a candidate is one fragment
#[tokio::test]
async fn test_pipeline_withTextSharedAcrossRoles_shouldSendOnce() {
    let input = split_body(&[row(&["e", "1", "c", "same_comma_ text", "0", "u", "s", "t", "same_comma_ text|other"])]);
    let transformer = RecordingTransformer::bracket();

    let (result, output) = run_pipeline(&transformer, &input, sequential()).await;
    result.unwrap();

    assert_eq!(transformer.batches()[0], vec!["same, text".to_string(), "u".into(), "other".into()]);
    assert_eq!(
        output,
        split_body(&[row(&["e", "1", "c", "[same_comma_ text]", "0", "[u]", "s", "t", "[same_comma_ text]|[other]"])])
    );
}

/// Each call carries exactly one episode's fragments, in input order
#[tokio::test]
async fn test_pipeline_withManyEpisodes_shouldCallOncePerEpisode() {
    for options in [sequential(), pipelined()] {
        let transformer = RecordingTransformer::identity();
        let input = synthetic_split(20, 3);

        let (result, output) = run_pipeline(&transformer, &input, options).await;
        let stats = result.unwrap();

        assert_eq!(output, input);
        assert_eq!(stats.transform_calls, 20);
        let batches = transformer.batches();
        assert_eq!(batches.len(), 20);
        for (episode, batch) in batches.iter().enumerate() {
            let prompt = format!("Prompt of episode {}, shared by all turns", episode);
            assert_eq!(batch[0], prompt);
            assert_eq!(batch.len(), 4);
            assert!(batch[1..].iter().all(|text| text.ends_with(&format!("of episode {}", episode))));
        }
    }
}

/// Text repeated in different episodes is sent again for each episode
#[tokio::test]
async fn test_pipeline_withTextSharedAcrossEpisodes_shouldSendItPerEpisode() {
    for options in [sequential(), pipelined()] {
        let transformer = RecordingTransformer::suffix();
        let input = split_body(&[
            row(&["a", "1", "c", "How are you?", "0", "Fine.", "s", "t"]),
            row(&["b", "1", "c", "How are you?", "0", "Tired.", "s", "t"]),
        ]);

        let (result, output) = run_pipeline(&transformer, &input, options).await;
        let stats = result.unwrap();

        assert_eq!(stats.transform_calls, 2);
        assert_eq!(
            transformer.batches(),
            vec![
                vec!["How are you?".to_string(), "Fine.".into()],
                vec!["How are you?".to_string(), "Tired.".into()],
            ]
        );
        assert_eq!(output.matches("How are you?_T").count(), 2);
    }
}

/// A result carrying a line break would split its row, so the run stops before writing it
#[tokio::test]
async fn test_pipeline_withLineBreakInResult_shouldAbortWithoutWriting() {
    for options in [sequential(), pipelined()] {
        let transformer = RecordingTransformer::new(|text| format!("{}\nsecond line", text));
        let input = split_body(&[row(&["e", "1", "c", "p", "0", "u", "s", "t"])]);

        let (result, output) = run_pipeline(&transformer, &input, options).await;

        assert!(matches!(
            result,
            Err(AppError::Dataset(DatasetError::LineBreak { record: 0, field: 3, slot: None }))
        ));
        assert_eq!(output.lines().count(), 1);
    }
}

/// A transformer failure stops the run; episodes written before it stay written
#[tokio::test]
async fn test_pipeline_withFailingTransformer_shouldAbort() {
    let transformer = FailingTransformer::new(1);
    let input = synthetic_split(3, 1);

    let (result, output) = run_pipeline(&transformer, &input, sequential()).await;

    assert!(matches!(result, Err(AppError::Translation(TranslationError::Provider(_)))));
    assert_eq!(output.lines().count(), 2);
}

/// Result lists of the wrong length are rejected
#[tokio::test]
async fn test_pipeline_withShortResults_shouldFailWithLengthMismatch() {
    let (result, output) = run_pipeline(&ShortTransformer, SAMPLE_SPLIT, pipelined()).await;

    assert!(matches!(
        result,
        Err(AppError::Translation(TranslationError::LengthMismatch { .. }))
    ));
    assert_eq!(output.lines().count(), 1);
}

/// A call exceeding the timeout aborts the run
#[tokio::test]
async fn test_pipeline_withSlowTransformer_shouldTimeOut() {
    let transformer = SlowTransformer::new(Duration::from_secs(5));
    let options = PipelineOptions {
        pipelined: false,
        transform_timeout: Some(Duration::from_millis(50)),
    };

    let (result, _) = run_pipeline(&transformer, SAMPLE_SPLIT, options).await;

    assert!(matches!(result, Err(AppError::Translation(TranslationError::Timeout(_)))));
}

/// Blank text fields are still sent as one fragment and written back unchanged
#[tokio::test]
async fn test_pipeline_withBlankTextFields_shouldStillWriteEpisode() {
    let transformer = RecordingTransformer::identity();
    let input = split_body(&[row(&["e", "1", "c", "", "0", "", "s", "t", ""])]);

    let (result, output) = run_pipeline(&transformer, &input, sequential()).await;
    let stats = result.unwrap();

    assert_eq!(output, input);
    assert_eq!(stats.episodes, 1);
    assert_eq!(stats.positions, 2);
    assert_eq!(transformer.batches(), vec![vec![String::new()]]);
}

/// Progress callbacks fire once per written episode
#[tokio::test]
async fn test_pipeline_progressCallback_shouldFireOncePerEpisode() {
    let transformer = RecordingTransformer::identity();
    let schema = RecordSchema::default();
    let format = RecordFormat::default();
    let pipeline = EpisodePipeline::new(&transformer, &schema, &format);

    let mut seen = Vec::new();
    let mut output = Vec::new();
    pipeline
        .run(Cursor::new(synthetic_split(4, 2)), &mut output, |stats| seen.push(stats.episodes))
        .await
        .unwrap();

    assert_eq!(seen, vec![1, 2, 3, 4]);
}
