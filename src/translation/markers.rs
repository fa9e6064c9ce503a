/*!
 * Numbered-marker batch protocol.
 *
 * Several texts travel in one prompt as
 *
 * ```text
 * <<ENTRY_0>>
 * first text
 * <<ENTRY_1>>
 * second text
 * <<END>>
 * ```
 *
 * and the model is asked to answer in the same shape.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::TranslationError;

/// Closing marker of a batch
pub const END_MARKER: &str = "<<END>>";

static ENTRY_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<<ENTRY_(\d+)>>").unwrap());

/// Opening marker of entry `index`
pub fn entry_marker(index: usize) -> String {
    format!("<<ENTRY_{}>>", index)
}

/// Wrap texts into one marker-delimited block
pub fn encode_entries<S: AsRef<str>>(texts: &[S]) -> String {
    let mut combined = String::new();
    for (index, text) in texts.iter().enumerate() {
        combined.push_str(&entry_marker(index));
        combined.push('\n');
        combined.push_str(text.as_ref());
        combined.push('\n');
    }
    combined.push_str(END_MARKER);
    combined
}

/// Number of entry markers in a block
pub fn count_entries(text: &str) -> usize {
    ENTRY_MARKER.find_iter(text).count()
}

/// Recover `expected` entries from a marker-delimited answer
///
/// Entries are located by their own marker, so text the model puts before
/// the first marker is ignored. Every entry and the closing marker must be
/// present.
pub fn decode_entries(response: &str, expected: usize) -> Result<Vec<String>, TranslationError> {
    let mut starts: Vec<Option<(usize, usize)>> = vec![None; expected];
    for captures in ENTRY_MARKER.captures_iter(response) {
        let (Some(whole), Some(number)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if let Ok(index) = number.as_str().parse::<usize>() {
            if index < expected && starts[index].is_none() {
                starts[index] = Some((whole.start(), whole.end()));
            }
        }
    }

    let end = response
        .rfind(END_MARKER)
        .ok_or_else(|| TranslationError::MalformedResponse("missing end marker".to_string()))?;

    let mut entries = Vec::with_capacity(expected);
    for index in 0..expected {
        let (_, body_start) = starts[index].ok_or_else(|| {
            TranslationError::MalformedResponse(format!("missing marker for entry {}", index))
        })?;
        let body_end = match starts.get(index + 1) {
            Some(Some((next_start, _))) => *next_start,
            Some(None) => {
                return Err(TranslationError::MalformedResponse(format!(
                    "missing marker for entry {}",
                    index + 1
                )));
            }
            None => end,
        };
        if body_end < body_start {
            return Err(TranslationError::MalformedResponse(format!(
                "entry {} is out of order",
                index
            )));
        }
        entries.push(response[body_start..body_end].trim().to_string());
    }

    Ok(entries)
}
