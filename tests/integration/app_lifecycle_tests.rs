/*!
 * Integration tests for application lifecycle
 */

use anyhow::Result;
use std::fs;
use std::time::Duration;

use dialogue_transcoder::app_config::Config;
use dialogue_transcoder::app_controller::Controller;
use dialogue_transcoder::build_gate::{GateOutcome, MARKER_FILE};

use crate::common::mock_transformers::{FailingTransformer, RecordingTransformer, SlowTransformer};
use crate::common::{self, SAMPLE_SPLIT, dataset_config, synthetic_split};

/// Test the controller initialization with default config
#[test]
fn test_controller_initialization_withDefaultConfig_shouldSucceed() -> Result<()> {
    let controller = Controller::new_for_test()?;

    assert_eq!(controller.config().dataset.splits, vec!["train", "valid", "test"]);
    Ok(())
}

/// Test the controller rejects an invalid configuration
#[test]
fn test_controller_withInvalidLanguage_shouldFail() {
    let mut config = Config::default();
    config.target_language = "klingon".to_string();

    assert!(Controller::with_config(config).is_err());
}

/// A full build writes every split and the marker
#[tokio::test]
async fn test_run_withPassthrough_shouldBuildEverySplit() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("input");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&input)?;
    common::create_test_file(&input, "train.csv", SAMPLE_SPLIT)?;
    common::create_test_file(&input, "valid.csv", &synthetic_split(3, 2))?;

    let controller = Controller::with_config(dataset_config(&input, &output, &["train", "valid"]))?;
    let report = controller.run(false).await?;

    assert_eq!(report.outcome, GateOutcome::Built);
    assert_eq!(report.splits.len(), 2);
    assert_eq!(fs::read_to_string(output.join("train.csv"))?, SAMPLE_SPLIT);
    assert_eq!(fs::read_to_string(output.join("valid.csv"))?, synthetic_split(3, 2));
    assert!(output.join(MARKER_FILE).exists());
    Ok(())
}

/// A second run against a built output performs no transformation calls
#[tokio::test]
async fn test_run_twice_shouldSkipSecondBuild() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("input");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&input)?;
    common::create_test_file(&input, "train.csv", SAMPLE_SPLIT)?;

    let controller = Controller::with_config(dataset_config(&input, &output, &["train"]))?;
    let transformer = RecordingTransformer::suffix();

    let first = controller.run_with_transformer(&transformer, false).await?;
    let calls_after_first = transformer.call_count();
    let second = controller.run_with_transformer(&transformer, false).await?;

    assert_eq!(first.outcome, GateOutcome::Built);
    assert_eq!(second.outcome, GateOutcome::Skipped);
    assert_eq!(second.transform_calls(), 0);
    assert_eq!(transformer.call_count(), calls_after_first);

    let forced = controller.run_with_transformer(&transformer, true).await?;
    assert_eq!(forced.outcome, GateOutcome::Built);
    assert_eq!(transformer.call_count(), calls_after_first * 2);
    Ok(())
}

/// A changed dataset version purges and rebuilds the output
#[tokio::test]
async fn test_run_withNewVersion_shouldRebuild() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("input");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&input)?;
    common::create_test_file(&input, "train.csv", SAMPLE_SPLIT)?;

    let mut config = dataset_config(&input, &output, &["train"]);
    Controller::with_config(config.clone())?.run(false).await?;
    fs::write(output.join("leftover.txt"), "stale")?;

    config.dataset.version = "2.0".to_string();
    let report = Controller::with_config(config)?.run(false).await?;

    assert_eq!(report.outcome, GateOutcome::Built);
    assert!(!output.join("leftover.txt").exists());
    assert!(fs::read_to_string(output.join(MARKER_FILE))?.contains("2.0"));
    Ok(())
}

/// A failed build leaves neither output nor marker
#[tokio::test]
async fn test_run_withFailingTransformer_shouldLeaveNoOutput() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("input");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&input)?;
    common::create_test_file(&input, "train.csv", &synthetic_split(5, 2))?;

    let controller = Controller::with_config(dataset_config(&input, &output, &["train"]))?;
    let result = controller.run_with_transformer(&FailingTransformer::new(2), false).await;

    assert!(result.is_err());
    assert!(!output.exists());
    let leftovers: Vec<_> = fs::read_dir(temp_dir.path())?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().contains(".partial-"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

/// A transformation timeout aborts without committing
#[tokio::test]
async fn test_run_withTimeout_shouldLeaveNoOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("input");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&input)?;
    common::create_test_file(&input, "train.csv", SAMPLE_SPLIT)?;

    let mut config = dataset_config(&input, &output, &["train"]);
    config.pipeline.transform_timeout_secs = Some(1);
    let controller = Controller::with_config(config)?;

    let result = controller
        .run_with_transformer(&SlowTransformer::new(Duration::from_secs(3)), false)
        .await;

    assert!(result.is_err());
    assert!(!output.join(MARKER_FILE).exists());
    Ok(())
}

/// Dropping a running build leaves nothing committed
#[tokio::test]
async fn test_run_whenCancelled_shouldLeaveNoOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("input");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&input)?;
    common::create_test_file(&input, "train.csv", SAMPLE_SPLIT)?;

    let controller = Controller::with_config(dataset_config(&input, &output, &["train"]))?;
    let transformer = SlowTransformer::new(Duration::from_secs(5));

    let cancelled = tokio::time::timeout(
        Duration::from_millis(100),
        controller.run_with_transformer(&transformer, false),
    )
    .await;

    assert!(cancelled.is_err());
    assert!(!output.exists());
    Ok(())
}

/// Missing split files are reported before anything is touched
#[tokio::test]
async fn test_run_withMissingSplit_shouldFailWithoutTouchingOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("input");
    let output = temp_dir.path().join("output");
    fs::create_dir_all(&input)?;
    common::create_test_file(&input, "train.csv", SAMPLE_SPLIT)?;
    fs::create_dir_all(&output)?;
    common::create_test_file(&output, "keep.csv", "x")?;

    let controller = Controller::with_config(dataset_config(&input, &output, &["train", "valid"]))?;
    let result = controller.run(false).await;

    assert!(result.is_err());
    assert!(output.join("keep.csv").exists());
    Ok(())
}

/// Without configured splits every csv in the input directory is built
#[test]
fn test_resolveSplits_withEmptyList_shouldDiscoverCsvFiles() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = temp_dir.path().join("input");
    fs::create_dir_all(&input)?;
    common::create_test_file(&input, "valid.csv", SAMPLE_SPLIT)?;
    common::create_test_file(&input, "train.csv", SAMPLE_SPLIT)?;
    common::create_test_file(&input, "notes.txt", "ignored")?;

    let controller = Controller::with_config(dataset_config(&input, &temp_dir.path().join("out"), &[]))?;

    assert_eq!(controller.resolve_splits()?, vec!["train", "valid"]);

    let report = tokio_test::block_on(controller.run(false))?;
    assert_eq!(report.splits.len(), 2);
    Ok(())
}

/// Durations are rendered compactly
#[test]
fn test_formatDuration_shouldPickLargestUnit() {
    assert_eq!(Controller::format_duration(Duration::from_millis(3250)), "3.250s");
    assert_eq!(Controller::format_duration(Duration::from_secs(125)), "2m 5s");
    assert_eq!(Controller::format_duration(Duration::from_secs(3725)), "1h 2m 5s");
}
