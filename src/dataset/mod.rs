/*!
 * Dataset side of the transcoder: reading rows, grouping them into episodes
 * and writing episodes back out.
 *
 * - `record`: row parsing, field roles and escaping conventions
 * - `segmenter`: episode grouping with turn sequence checks
 * - `writer`: per-episode streaming output
 */

pub mod record;
pub mod segmenter;
pub mod writer;

pub use self::record::{FieldRole, Record, RecordFormat, RecordSchema};
pub use self::segmenter::{Episode, EpisodeSegmenter};
pub use self::writer::EpisodeWriter;
