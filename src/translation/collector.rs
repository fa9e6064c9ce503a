/*!
 * Fragment collection.
 *
 * Walks one episode and gathers every distinct piece of text that has to go
 * through the transformer, together with every place it has to be written
 * back to. Identical text is only listed once per episode no matter how many
 * times it occurs; nothing survives from one episode to the next.
 */

use std::collections::{BTreeMap, HashMap};

use crate::dataset::{Episode, FieldRole, RecordFormat, RecordSchema};
use crate::errors::DatasetError;

/// Write-back location of a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    /// Record index within the episode
    pub record: usize,
    /// Field index within the record
    pub field: usize,
    /// Value index within a multi-value field
    pub slot: Option<usize>,
}

impl Position {
    pub fn single(record: usize, field: usize) -> Self {
        Self { record, field, slot: None }
    }

    pub fn multi(record: usize, field: usize, slot: usize) -> Self {
        Self { record, field, slot: Some(slot) }
    }
}

/// Insertion-ordered map from fragment text to its positions
///
/// The insertion order is the order fragments are submitted in, so result
/// `i` of the transformer belongs to entry `i`.
#[derive(Debug, Default)]
pub struct FragmentMap {
    index: HashMap<String, usize>,
    entries: Vec<(String, Vec<Position>)>,
}

impl FragmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more position for `text`, adding the text if it is new
    pub fn register(&mut self, text: String, position: Position) {
        match self.index.get(&text) {
            Some(&slot) => self.entries[slot].1.push(position),
            None => {
                self.index.insert(text.clone(), self.entries.len());
                self.entries.push((text, vec![position]));
            }
        }
    }

    /// Number of distinct fragments
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of positions across all fragments
    pub fn position_count(&self) -> usize {
        self.entries.iter().map(|(_, positions)| positions.len()).sum()
    }

    /// Distinct fragment texts in submission order
    pub fn texts(&self) -> Vec<String> {
        self.entries.iter().map(|(text, _)| text.clone()).collect()
    }

    pub fn positions(&self, text: &str) -> Option<&[Position]> {
        self.index.get(text).map(|&slot| self.entries[slot].1.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Position])> {
        self.entries.iter().map(|(text, positions)| (text.as_str(), positions.as_slice()))
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Vec<Position>)> {
        self.entries
    }
}

/// Key of a multi-value field: (record index, field index)
pub type SlotKey = (usize, usize);

/// Placeholder slots for the values of every multi-value field in an episode
#[derive(Debug, Default)]
pub struct CandidateSlots {
    slots: BTreeMap<SlotKey, Vec<Option<String>>>,
}

impl CandidateSlots {
    /// Reserve the next empty slot for the field and return its index
    pub fn reserve(&mut self, key: SlotKey) -> usize {
        let values = self.slots.entry(key).or_default();
        values.push(None);
        values.len() - 1
    }

    /// Fill a reserved slot
    pub fn fill(&mut self, key: SlotKey, slot: usize, value: String) -> Result<(), DatasetError> {
        match self.slots.get_mut(&key).and_then(|values| values.get_mut(slot)) {
            Some(target) => {
                *target = Some(value);
                Ok(())
            }
            None => Err(DatasetError::IncompletePosition {
                record: key.0,
                field: key.1,
                slot: Some(slot),
            }),
        }
    }

    /// Number of multi-value fields with reserved slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots reserved for one field
    pub fn get(&self, key: SlotKey) -> Option<&[Option<String>]> {
        self.slots.get(&key).map(Vec::as_slice)
    }

    pub(crate) fn into_entries(self) -> impl Iterator<Item = (SlotKey, Vec<Option<String>>)> {
        self.slots.into_iter()
    }
}

/// Everything gathered from one episode
#[derive(Debug, Default)]
pub struct CollectedEpisode {
    pub fragments: FragmentMap,
    pub slots: CandidateSlots,
}

/// Scans episodes for translatable text according to the schema's field roles
pub struct FragmentCollector<'a> {
    schema: &'a RecordSchema,
    format: &'a RecordFormat,
}

impl<'a> FragmentCollector<'a> {
    pub fn new(schema: &'a RecordSchema, format: &'a RecordFormat) -> Self {
        Self { schema, format }
    }

    pub fn collect(&self, episode: &Episode) -> CollectedEpisode {
        let mut collected = CollectedEpisode::default();

        for (record_index, record) in episode.records().iter().enumerate() {
            for (field_index, raw) in record.fields().iter().enumerate() {
                match self.schema.role(field_index) {
                    FieldRole::PassThrough => {}
                    FieldRole::SingleText => {
                        collected.fragments.register(
                            self.format.unescape_field(raw),
                            Position::single(record_index, field_index),
                        );
                    }
                    FieldRole::MultiText => {
                        if raw.is_empty() {
                            continue;
                        }
                        for value in self.format.split_values(raw) {
                            let slot = collected.slots.reserve((record_index, field_index));
                            collected.fragments.register(
                                self.format.unescape_value(value),
                                Position::multi(record_index, field_index, slot),
                            );
                        }
                    }
                }
            }
        }

        collected
    }
}
