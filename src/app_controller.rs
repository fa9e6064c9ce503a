use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::build_gate::{BuildGate, GateOutcome};
use crate::file_utils::FileManager;
use crate::pipeline::{EpisodePipeline, PipelineOptions, PipelineStats};
use crate::translation::{TextTransformer, transformer_from_config};

// @module: Application controller for dataset builds

/// Result of one split
#[derive(Debug, Clone)]
pub struct SplitReport {
    pub split: String,
    pub stats: PipelineStats,
    pub elapsed: Duration,
}

/// Result of a gated build
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub outcome: GateOutcome,
    /// Empty when the build was skipped
    pub splits: Vec<SplitReport>,
}

impl BuildReport {
    /// Transformer calls across all splits
    pub fn transform_calls(&self) -> usize {
        self.splits.iter().map(|report| report.stats.transform_calls).sum()
    }
}

/// Main application controller for dataset translation
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    /// Create a new controller for test purposes with default configuration
    pub fn new_for_test() -> Result<Self> {
        Self::with_config(Config::default())
    }

    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build every split with the transformer described by the configuration
    pub async fn run(&self, force: bool) -> Result<BuildReport> {
        let transformer = transformer_from_config(&self.config)?;

        // A failed check is only reported; the build surfaces real failures itself
        if let Err(e) = transformer.test_connection().await {
            warn!("Connection check for {} failed: {}", transformer.name(), e);
        }

        self.run_with_transformer(transformer.as_ref(), force).await
    }

    /// Build every split through `transformer`, behind the build gate
    pub async fn run_with_transformer(&self, transformer: &dyn TextTransformer, force: bool) -> Result<BuildReport> {
        let dataset = &self.config.dataset;
        let splits = self.resolve_splits()?;
        for split in &splits {
            let input = dataset.input_file(split);
            if !FileManager::file_exists(&input) {
                return Err(anyhow!("Input file does not exist: {:?}", input));
            }
        }

        info!(
            "Building {} split(s) from {:?} into {:?} with {} ({} -> {})",
            splits.len(),
            dataset.input_dir,
            dataset.output_dir,
            transformer.name(),
            self.config.source_language,
            self.config.target_language
        );

        let gate = BuildGate::new(&dataset.output_dir, &dataset.version);
        let mut reports = Vec::with_capacity(splits.len());
        let outcome = gate
            .run(force, |staging| {
                let reports = &mut reports;
                let splits = &splits;
                async move {
                    for split in splits {
                        reports.push(self.build_split(transformer, split, &staging).await?);
                    }
                    Ok(())
                }
            })
            .await?;

        if outcome == GateOutcome::Built {
            let total: usize = reports.iter().map(|report| report.stats.episodes).sum();
            info!("Build complete: {} episodes in {} split(s)", total, reports.len());
        }

        Ok(BuildReport { outcome, splits: reports })
    }

    /// Configured split names, or every `*.csv` in the input directory when none are listed
    pub fn resolve_splits(&self) -> Result<Vec<String>> {
        let dataset = &self.config.dataset;
        if !dataset.splits.is_empty() {
            return Ok(dataset.splits.clone());
        }

        let splits: Vec<String> = FileManager::find_files(&dataset.input_dir, "csv")?
            .iter()
            .filter_map(|path| path.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .collect();
        if splits.is_empty() {
            return Err(anyhow!("No .csv files found in {:?}", dataset.input_dir));
        }
        Ok(splits)
    }

    async fn build_split(&self, transformer: &dyn TextTransformer, split: &str, staging: &Path) -> Result<SplitReport> {
        let start_time = Instant::now();
        let input = self.config.dataset.input_file(split);
        let output: PathBuf = staging.join(format!("{}.csv", split));

        let total_lines = FileManager::count_lines(&input)?;
        let progress_bar = ProgressBar::new(total_lines as u64);
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} lines ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));
        progress_bar.set_message(split.to_string());

        let reader = FileManager::open_reader(&input)?;
        let writer = BufWriter::new(
            File::create(&output).with_context(|| format!("Failed to create output file: {:?}", output))?,
        );

        let pipeline = EpisodePipeline::new(transformer, &self.config.dataset.schema, &self.config.dataset.format)
            .with_options(PipelineOptions {
                pipelined: self.config.pipeline.pipelined,
                transform_timeout: self.config.pipeline.transform_timeout(),
            });

        let result = pipeline
            .run(reader, writer, |stats| progress_bar.set_position(stats.lines_read as u64))
            .await;
        progress_bar.finish_and_clear();

        let stats = result.with_context(|| format!("Failed to build split '{}' from {:?}", split, input))?;
        let elapsed = start_time.elapsed();

        info!(
            "Split '{}': {} episodes, {} records, {} fragments, {} positions, {} transform calls in {}",
            split,
            stats.episodes,
            stats.records,
            stats.fragments,
            stats.positions,
            stats.transform_calls,
            Self::format_duration(elapsed)
        );

        Ok(SplitReport {
            split: split.to_string(),
            stats,
            elapsed,
        })
    }

    /// Format a duration as `1h 2m 3s`, `2m 3s` or `3.250s`
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
