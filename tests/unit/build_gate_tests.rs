/*!
 * Tests for the build gate
 */

use anyhow::{Result, anyhow};
use std::fs;
use dialogue_transcoder::build_gate::{BuildGate, GateOutcome, MARKER_FILE};
use crate::common;

/// Test an output directory without marker counts as not built and is replaced
#[tokio::test]
async fn test_run_withUnmarkedOutput_shouldReplaceIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let output = temp_dir.path().join("out");
    fs::create_dir_all(&output)?;
    common::create_test_file(&output, "half_written.csv", "partial")?;

    let gate = BuildGate::new(&output, "1.0");
    assert!(!gate.is_built());

    let outcome = gate
        .run(false, |staging| async move {
            fs::write(staging.join("train.csv"), "complete")?;
            Ok(())
        })
        .await?;

    assert_eq!(outcome, GateOutcome::Built);
    assert!(!output.join("half_written.csv").exists());
    assert_eq!(fs::read_to_string(output.join("train.csv"))?, "complete");
    Ok(())
}

/// Test the marker holds a timestamp line and a version line
#[tokio::test]
async fn test_markDone_shouldWriteTimestampAndVersion() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let gate = BuildGate::new(temp_dir.path().join("out"), "3.2");

    gate.run(false, |_| async { Ok(()) }).await?;

    let content = fs::read_to_string(temp_dir.path().join("out").join(MARKER_FILE))?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(!lines[0].is_empty());
    assert_eq!(lines[1], "3.2");
    Ok(())
}

/// Test a failed rebuild still removes the outdated output
#[tokio::test]
async fn test_run_withFailedRebuild_shouldNotRestoreOldOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let output = temp_dir.path().join("out");
    BuildGate::new(&output, "1.0").run(false, |_| async { Ok(()) }).await?;

    let result = BuildGate::new(&output, "2.0")
        .run(false, |_| async { Err(anyhow!("model unavailable")) })
        .await;

    assert!(result.is_err());
    assert!(!output.exists());
    Ok(())
}
