/*!
 * Episode output.
 *
 * Each episode is written as soon as it is reassembled and the stream is
 * flushed right after, so nothing of a finished episode stays buffered in
 * memory.
 */

use std::io::{self, Write};

use super::record::RecordFormat;
use super::segmenter::Episode;

/// Streams episodes to a writer using the input delimiter conventions
pub struct EpisodeWriter<W: Write> {
    inner: W,
    format: RecordFormat,
    episodes_written: usize,
    records_written: usize,
}

impl<W: Write> EpisodeWriter<W> {
    pub fn new(inner: W, format: RecordFormat) -> Self {
        Self {
            inner,
            format,
            episodes_written: 0,
            records_written: 0,
        }
    }

    /// Copy the header line through unchanged
    pub fn write_header(&mut self, header: &str) -> io::Result<()> {
        writeln!(self.inner, "{}", header)
    }

    /// Write every record of the episode in order, then flush
    pub fn write_episode(&mut self, episode: Episode) -> io::Result<()> {
        for record in episode.records() {
            writeln!(self.inner, "{}", self.format.join_fields(record.fields()))?;
        }
        self.inner.flush()?;

        self.episodes_written += 1;
        self.records_written += episode.len();
        Ok(())
    }

    pub fn episodes_written(&self) -> usize {
        self.episodes_written
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flush and give back the underlying writer
    pub fn into_inner(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
