/*!
 * Episode pipeline driver.
 *
 * Reads one split row by row, closes episodes through the segmenter, and for
 * each episode runs collect, one transformer call, reassemble and write, in
 * input order. At most one episode is held at a time, two when pipelined:
 * then the next episode is read and collected while the transformer call of
 * the current one is awaited.
 */

use std::io::{BufRead, Lines, Write};
use std::time::Duration;

use log::debug;

use crate::dataset::{Episode, EpisodeSegmenter, EpisodeWriter, Record, RecordFormat, RecordSchema};
use crate::errors::AppError;
use crate::translation::{BatchInvoker, CollectedEpisode, FragmentCollector, Reassembler, TextTransformer};

/// Driver settings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineOptions {
    /// Overlap collection of the next episode with the current transformer call
    pub pipelined: bool,
    /// Upper bound for one transformer call
    pub transform_timeout: Option<Duration>,
}

/// Counters of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Lines consumed, header included
    pub lines_read: usize,
    pub episodes: usize,
    pub records: usize,
    /// Distinct fragments sent, summed over episodes
    pub fragments: usize,
    /// Write-back positions filled
    pub positions: usize,
    /// Transformer calls made
    pub transform_calls: usize,
}

/// An episode with its fragments gathered, waiting for its transformer call
struct EpisodeJob {
    episode: Episode,
    collected: CollectedEpisode,
}

/// Turns the line stream into closed episodes
struct EpisodeSource<'a, R: BufRead> {
    lines: Lines<R>,
    line: usize,
    segmenter: EpisodeSegmenter,
    format: &'a RecordFormat,
    schema: &'a RecordSchema,
}

impl<R: BufRead> EpisodeSource<'_, R> {
    fn next_episode(&mut self, stats: &mut PipelineStats) -> Result<Option<Episode>, AppError> {
        for raw in self.lines.by_ref() {
            let raw = raw?;
            self.line += 1;
            stats.lines_read += 1;

            let record = Record::parse(self.line, &raw, self.format, self.schema)?;
            if let Some(episode) = self.segmenter.push(record)? {
                return Ok(Some(episode));
            }
        }
        Ok(self.segmenter.close())
    }
}

/// Runs the collect, transform, reassemble and write steps over one split
pub struct EpisodePipeline<'a> {
    transformer: &'a dyn TextTransformer,
    schema: &'a RecordSchema,
    format: &'a RecordFormat,
    options: PipelineOptions,
}

impl<'a> EpisodePipeline<'a> {
    pub fn new(transformer: &'a dyn TextTransformer, schema: &'a RecordSchema, format: &'a RecordFormat) -> Self {
        Self {
            transformer,
            schema,
            format,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Process `input` into `output`
    ///
    /// The header line is copied verbatim; an empty input produces an empty
    /// output. `on_episode` is called after every written episode.
    pub async fn run<R, W, F>(&self, input: R, output: W, mut on_episode: F) -> Result<PipelineStats, AppError>
    where
        R: BufRead,
        W: Write,
        F: FnMut(&PipelineStats),
    {
        let mut stats = PipelineStats::default();
        let mut lines = input.lines();
        let mut writer = EpisodeWriter::new(output, self.format.clone());

        match lines.next() {
            Some(header) => {
                let header = header?;
                stats.lines_read = 1;
                writer.write_header(header.trim_end_matches('\r'))?;
            }
            None => return Ok(stats),
        }

        let mut source = EpisodeSource {
            lines,
            line: 1,
            segmenter: EpisodeSegmenter::new(self.schema),
            format: self.format,
            schema: self.schema,
        };
        let invoker = BatchInvoker::new(self.transformer).with_timeout(self.options.transform_timeout);

        if self.options.pipelined {
            let mut pending = source.next_episode(&mut stats)?.map(|episode| self.prepare(episode));
            while let Some(job) = pending.take() {
                let (results, next) = tokio::join!(invoker.invoke(&job.collected.fragments), async {
                    source
                        .next_episode(&mut stats)
                        .map(|episode| episode.map(|episode| self.prepare(episode)))
                });
                let results = results?;
                pending = next?;

                self.finish(job, results, &mut writer, &mut stats)?;
                on_episode(&stats);
            }
        } else {
            while let Some(episode) = source.next_episode(&mut stats)? {
                let job = self.prepare(episode);
                let results = invoker.invoke(&job.collected.fragments).await?;

                self.finish(job, results, &mut writer, &mut stats)?;
                on_episode(&stats);
            }
        }

        writer.into_inner()?;
        Ok(stats)
    }

    fn prepare(&self, episode: Episode) -> EpisodeJob {
        let collected = FragmentCollector::new(self.schema, self.format).collect(&episode);
        EpisodeJob { episode, collected }
    }

    fn finish<W: Write>(
        &self,
        job: EpisodeJob,
        results: Vec<String>,
        writer: &mut EpisodeWriter<W>,
        stats: &mut PipelineStats,
    ) -> Result<(), AppError> {
        let EpisodeJob { mut episode, collected } = job;
        let fragments = collected.fragments.len();
        let positions = collected.fragments.position_count();
        let called = BatchInvoker::needs_call(&collected.fragments);

        let written = Reassembler::new(self.format).reassemble(&mut episode, collected, results)?;
        debug_assert_eq!(written, positions);

        debug!(
            "Episode '{}' at line {}: {} records, {} fragments, {} positions",
            episode.id(),
            episode.first_line(),
            episode.len(),
            fragments,
            positions
        );

        stats.episodes += 1;
        stats.records += episode.len();
        stats.fragments += fragments;
        stats.positions += written;
        stats.transform_calls += usize::from(called);

        writer.write_episode(episode)?;
        Ok(())
    }
}
