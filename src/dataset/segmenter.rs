/*!
 * Episode segmentation.
 *
 * Rows arrive one at a time. Consecutive rows sharing an episode id form an
 * episode, and within an episode the turn index must climb by exactly one
 * from 1. The segmenter hands back an episode as soon as the next row shows
 * it is finished, so at most one episode is ever held.
 */

use log::trace;

use super::record::{Record, RecordSchema};
use crate::errors::DatasetError;

/// A closed run of records sharing one episode id
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    id: String,
    records: Vec<Record>,
}

impl Episode {
    pub fn new(id: impl Into<String>, records: Vec<Record>) -> Self {
        Self { id: id.into(), records }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Line number of the first record, for log messages
    pub fn first_line(&self) -> usize {
        self.records.first().map(Record::line).unwrap_or_default()
    }

    /// Overwrite one field of one record; false if either index is out of range
    pub fn set_field(&mut self, record: usize, field: usize, value: String) -> bool {
        self.records
            .get_mut(record)
            .is_some_and(|r| r.set_field(field, value))
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Episode still receiving rows
#[derive(Debug)]
struct OpenEpisode {
    id: String,
    /// Turn index of the last accepted row, `None` when it was not an integer
    last_turn: Option<u32>,
    records: Vec<Record>,
}

impl OpenEpisode {
    fn close(self) -> Episode {
        Episode::new(self.id, self.records)
    }
}

/// Groups a row stream into episodes
#[derive(Debug)]
pub struct EpisodeSegmenter {
    episode_id_field: usize,
    turn_field: usize,
    current: Option<OpenEpisode>,
}

impl EpisodeSegmenter {
    pub fn new(schema: &RecordSchema) -> Self {
        Self {
            episode_id_field: schema.episode_id_field,
            turn_field: schema.turn_field,
            current: None,
        }
    }

    /// Feed the next row
    ///
    /// Returns the previous episode when this row starts a new one. A row that
    /// continues the open episode with the wrong turn index is a
    /// [`DatasetError::TurnSequence`].
    pub fn push(&mut self, record: Record) -> Result<Option<Episode>, DatasetError> {
        let id = record.field(self.episode_id_field).unwrap_or_default().to_string();
        let raw_turn = record.field(self.turn_field).unwrap_or_default();
        let turn = raw_turn.trim().parse::<u32>().ok();

        if let Some(open) = self.current.as_mut().filter(|open| open.id == id) {
            let expected = open.records.len() as u32 + 1;
            let follows_previous = open.last_turn.is_some_and(|last| turn == last.checked_add(1));

            if !follows_previous || turn != Some(expected) {
                return Err(DatasetError::TurnSequence {
                    line: record.line(),
                    episode_id: id,
                    expected,
                    found: raw_turn.to_string(),
                });
            }

            open.last_turn = turn;
            open.records.push(record);
            return Ok(None);
        }

        trace!("Episode '{}' starts at line {}", id, record.line());
        let started = OpenEpisode {
            id,
            last_turn: turn,
            records: vec![record],
        };

        Ok(self.current.replace(started).map(OpenEpisode::close))
    }

    /// End of input: hand back whatever episode is still open
    pub fn close(&mut self) -> Option<Episode> {
        self.current.take().map(OpenEpisode::close)
    }

    /// Number of rows currently held
    pub fn pending_records(&self) -> usize {
        self.current.as_ref().map_or(0, |open| open.records.len())
    }
}
