/*!
 * Reinsertion of transformed fragments.
 *
 * Result `i` of a batch belongs to fragment `i` of the [`FragmentMap`] that
 * produced it. Every recorded position receives it: single-value fields
 * directly, multi-value fields through their reserved slots, which are only
 * joined once every slot is filled.
 */

use log::trace;

use super::collector::{CandidateSlots, CollectedEpisode};
use crate::dataset::{Episode, RecordFormat};
use crate::errors::{AppError, DatasetError, TranslationError};

/// Writes transformed fragments back into their episode
pub struct Reassembler<'a> {
    format: &'a RecordFormat,
}

impl<'a> Reassembler<'a> {
    pub fn new(format: &'a RecordFormat) -> Self {
        Self { format }
    }

    /// Apply `results` to `episode` and return the number of positions written
    pub fn reassemble(
        &self,
        episode: &mut Episode,
        collected: CollectedEpisode,
        results: Vec<String>,
    ) -> Result<usize, AppError> {
        let CollectedEpisode { fragments, mut slots } = collected;

        if results.len() != fragments.len() {
            return Err(TranslationError::LengthMismatch {
                expected: fragments.len(),
                received: results.len(),
            }
            .into());
        }

        let mut written = 0;
        for ((_, positions), result) in fragments.into_entries().into_iter().zip(results) {
            // rows are line-delimited; no escape exists for a line terminator
            if result.contains(['\n', '\r']) {
                if let Some(position) = positions.first() {
                    return Err(DatasetError::LineBreak {
                        record: position.record,
                        field: position.field,
                        slot: position.slot,
                    }
                    .into());
                }
            }

            for position in positions {
                match position.slot {
                    None => {
                        let escaped = self.format.escape_field(&result);
                        if !episode.set_field(position.record, position.field, escaped) {
                            return Err(DatasetError::IncompletePosition {
                                record: position.record,
                                field: position.field,
                                slot: None,
                            }
                            .into());
                        }
                    }
                    Some(slot) => {
                        slots.fill(
                            (position.record, position.field),
                            slot,
                            self.format.escape_value(&result),
                        )?;
                    }
                }
                written += 1;
            }
        }

        self.join_slots(episode, slots)?;
        trace!("Reassembled {} positions in episode '{}'", written, episode.id());

        Ok(written)
    }

    fn join_slots(&self, episode: &mut Episode, slots: CandidateSlots) -> Result<(), AppError> {
        for ((record, field), values) in slots.into_entries() {
            let mut filled = Vec::with_capacity(values.len());
            for (slot, value) in values.into_iter().enumerate() {
                match value {
                    Some(value) => filled.push(value),
                    None => {
                        return Err(DatasetError::IncompletePosition { record, field, slot: Some(slot) }.into());
                    }
                }
            }

            let joined = self.format.join_values(&filled);
            if !episode.set_field(record, field, joined) {
                return Err(DatasetError::IncompletePosition { record, field, slot: None }.into());
            }
        }
        Ok(())
    }
}
