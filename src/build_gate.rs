/*!
 * Idempotency gate around a dataset build.
 *
 * A completed build leaves a `.built` marker in its output directory holding
 * the build timestamp and the dataset version. A later run with the same
 * version is a no-op. Any other existing output is purged first. The build
 * itself writes into a staging directory next to the output directory, which
 * is only renamed into place after the build future completes successfully;
 * a failed or dropped build leaves neither output nor marker behind.
 */

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use log::{debug, info, warn};

use crate::file_utils::FileManager;

/// Marker file name inside the output directory
pub const MARKER_FILE: &str = ".built";

/// Parsed content of the marker file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMarker {
    pub timestamp: String,
    pub version: String,
}

impl BuildMarker {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            version: version.into(),
        }
    }

    /// One line per value: timestamp then version
    pub fn parse(content: &str) -> Option<Self> {
        let mut lines = content.lines();
        let timestamp = lines.next()?.trim().to_string();
        let version = lines.next()?.trim().to_string();
        Some(Self { timestamp, version })
    }

    pub fn render(&self) -> String {
        format!("{}\n{}\n", self.timestamp, self.version)
    }
}

/// What a gated run ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Output was already built for this version
    Skipped,
    /// Output was (re)built and marked
    Built,
}

/// Gate over one output directory and dataset version
#[derive(Debug, Clone)]
pub struct BuildGate {
    output_dir: PathBuf,
    version: String,
}

impl BuildGate {
    pub fn new(output_dir: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            version: version.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn marker_path(&self) -> PathBuf {
        self.output_dir.join(MARKER_FILE)
    }

    /// Marker content, `None` when absent or unreadable
    pub fn read_marker(&self) -> Option<BuildMarker> {
        fs::read_to_string(self.marker_path())
            .ok()
            .and_then(|content| BuildMarker::parse(&content))
    }

    /// Whether the output is built for the current version
    pub fn is_built(&self) -> bool {
        self.read_marker()
            .is_some_and(|marker| marker.version == self.version)
    }

    /// Run `build` unless the output is already built
    ///
    /// `build` receives the staging directory to write into. With `force` the
    /// build runs even when the marker matches.
    pub async fn run<F, Fut>(&self, force: bool, build: F) -> Result<GateOutcome>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if !force && self.is_built() {
            info!(
                "Output {:?} already built for version {}, skipping",
                self.output_dir, self.version
            );
            return Ok(GateOutcome::Skipped);
        }

        if self.output_dir.exists() {
            match self.read_marker() {
                Some(marker) => warn!(
                    "Removing output {:?} built for version {} (current: {})",
                    self.output_dir, marker.version, self.version
                ),
                None => warn!("Removing incomplete output {:?}", self.output_dir),
            }
            FileManager::remove_dir_if_exists(&self.output_dir)?;
        }

        let staging = self.staging_dir()?;
        debug!("Staging build in {:?}", staging.path());

        build(staging.path().to_path_buf()).await?;

        let staged = staging.keep();
        fs::rename(&staged, &self.output_dir).with_context(|| {
            format!("Failed to move staged build {:?} to {:?}", staged, self.output_dir)
        })?;
        self.mark_done()?;

        Ok(GateOutcome::Built)
    }

    /// Write the marker for the current version
    pub fn mark_done(&self) -> Result<()> {
        FileManager::write_to_file(self.marker_path(), &BuildMarker::new(&self.version).render())
    }

    fn staging_dir(&self) -> Result<tempfile::TempDir> {
        let name = self
            .output_dir
            .file_name()
            .ok_or_else(|| anyhow!("Output directory has no name: {:?}", self.output_dir))?
            .to_string_lossy()
            .into_owned();
        let parent = match self.output_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        FileManager::ensure_dir(&parent)?;

        tempfile::Builder::new()
            .prefix(&format!(".{}.partial-", name))
            .tempdir_in(&parent)
            .with_context(|| format!("Failed to create staging directory in {:?}", parent))
    }
}
