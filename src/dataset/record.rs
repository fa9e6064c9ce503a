/*!
 * Record parsing and the declarative record layout.
 *
 * A record is one line of the dataset, split on the field delimiter. What a
 * field means is described by a [`RecordSchema`] (one [`FieldRole`] per field
 * index) and how text is escaped inside a field by a [`RecordFormat`].
 */

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::errors::DatasetError;

/// Role a field plays in the transcoding pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    /// Copied through untouched
    PassThrough,
    /// One translatable text value
    SingleText,
    /// Zero or more translatable values joined by the multi-value separator
    MultiText,
}

impl FieldRole {
    /// Whether the field carries text that goes through the transformer
    pub fn is_text(self) -> bool {
        !matches!(self, Self::PassThrough)
    }
}

/// Delimiter conventions of the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFormat {
    /// Field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Token standing in for a literal delimiter inside a text field
    #[serde(default = "default_delimiter_token")]
    pub delimiter_token: String,

    /// Separator between values of a multi-value field
    #[serde(default = "default_separator")]
    pub separator: char,

    /// Token standing in for a literal separator inside one value
    #[serde(default = "default_separator_token")]
    pub separator_token: String,
}

impl Default for RecordFormat {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            delimiter_token: default_delimiter_token(),
            separator: default_separator(),
            separator_token: default_separator_token(),
        }
    }
}

fn default_delimiter() -> char {
    ','
}

fn default_delimiter_token() -> String {
    "_comma_".to_string()
}

fn default_separator() -> char {
    '|'
}

fn default_separator_token() -> String {
    "_pipe_".to_string()
}

impl RecordFormat {
    /// Split a raw line into its fields
    pub fn split_line(&self, line: &str) -> Vec<String> {
        line.split(self.delimiter).map(str::to_string).collect()
    }

    /// Join fields back into one line (without terminator)
    pub fn join_fields(&self, fields: &[String]) -> String {
        let mut buf = [0u8; 4];
        fields.join(&*self.delimiter.encode_utf8(&mut buf))
    }

    /// Split a multi-value field into its raw values
    pub fn split_values<'a>(&self, field: &'a str) -> std::str::Split<'a, char> {
        field.split(self.separator)
    }

    /// Join already escaped values of a multi-value field
    pub fn join_values(&self, values: &[String]) -> String {
        let mut buf = [0u8; 4];
        values.join(&*self.separator.encode_utf8(&mut buf))
    }

    /// Restore literal delimiters in a single-value field
    pub fn unescape_field(&self, raw: &str) -> String {
        let mut buf = [0u8; 4];
        raw.replace(self.delimiter_token.as_str(), self.delimiter.encode_utf8(&mut buf))
    }

    /// Hide literal delimiters of a single-value field behind the token
    pub fn escape_field(&self, text: &str) -> String {
        text.replace(self.delimiter, &self.delimiter_token)
    }

    /// Restore literal separators and delimiters in one value of a multi-value field
    pub fn unescape_value(&self, raw: &str) -> String {
        let mut buf = [0u8; 4];
        let unpiped = raw.replace(self.separator_token.as_str(), self.separator.encode_utf8(&mut buf));
        self.unescape_field(&unpiped)
    }

    /// Escape one value of a multi-value field for both the delimiter and the separator
    pub fn escape_value(&self, text: &str) -> String {
        self.escape_field(text)
            .replace(self.separator, &self.separator_token)
    }

    /// Check the conventions are usable together
    pub fn validate(&self) -> Result<()> {
        if self.delimiter == self.separator {
            return Err(anyhow!("Field delimiter and multi-value separator must differ"));
        }
        if self.delimiter_token.is_empty() || self.separator_token.is_empty() {
            return Err(anyhow!("Escape tokens cannot be empty"));
        }
        if self.delimiter_token.contains(self.delimiter) || self.separator_token.contains(self.separator) {
            return Err(anyhow!("Escape tokens cannot contain the character they stand for"));
        }
        Ok(())
    }
}

/// Field layout of a record: one role per field index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Role of each field, by index; its length is the largest accepted arity
    pub roles: Vec<FieldRole>,

    /// Number of fields every record must carry; trailing fields past this are optional
    pub required_fields: usize,

    /// Index of the field holding the episode id
    pub episode_id_field: usize,

    /// Index of the field holding the 1-based turn index
    pub turn_field: usize,
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self::empathetic_dialogues()
    }
}

impl RecordSchema {
    /// Layout of the EmpatheticDialogues CSV files
    ///
    /// `[0] conv id, [1] turn, [2] emotion, [3] prompt, [4] speaker,
    /// [5] utterance, [6] prefix A, [7] prefix B, [8] candidates (optional)`
    pub fn empathetic_dialogues() -> Self {
        use FieldRole::{MultiText, PassThrough, SingleText};

        Self {
            roles: vec![
                PassThrough,
                PassThrough,
                PassThrough,
                SingleText,
                PassThrough,
                SingleText,
                PassThrough,
                PassThrough,
                MultiText,
            ],
            required_fields: 8,
            episode_id_field: 0,
            turn_field: 1,
        }
    }

    /// Smallest accepted field count
    pub fn min_fields(&self) -> usize {
        self.required_fields
    }

    /// Largest accepted field count
    pub fn max_fields(&self) -> usize {
        self.roles.len()
    }

    /// Role of the field at `index`
    pub fn role(&self, index: usize) -> FieldRole {
        self.roles.get(index).copied().unwrap_or(FieldRole::PassThrough)
    }

    /// Check the layout is consistent
    pub fn validate(&self) -> Result<()> {
        if self.required_fields == 0 || self.required_fields > self.roles.len() {
            return Err(anyhow!(
                "required_fields must be between 1 and {} (the number of roles), got {}",
                self.roles.len(),
                self.required_fields
            ));
        }
        for (name, index) in [("episode_id_field", self.episode_id_field), ("turn_field", self.turn_field)] {
            if index >= self.required_fields {
                return Err(anyhow!("{} ({}) must point at a required field", name, index));
            }
            if self.role(index).is_text() {
                return Err(anyhow!("{} ({}) cannot be a translatable field", name, index));
            }
        }
        if self.episode_id_field == self.turn_field {
            return Err(anyhow!("episode_id_field and turn_field must differ"));
        }
        if !self.roles.iter().any(|role| role.is_text()) {
            return Err(anyhow!("Schema has no translatable field"));
        }
        Ok(())
    }
}

/// One parsed row of the dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 1-based line number in the source file
    line: usize,
    /// Raw (still escaped) field values
    fields: Vec<String>,
}

impl Record {
    /// Build a record from already split fields
    pub fn new(line: usize, fields: Vec<String>) -> Self {
        Self { line, fields }
    }

    /// Parse one raw line, rejecting any arity the schema does not accept
    pub fn parse(
        line: usize,
        raw: &str,
        format: &RecordFormat,
        schema: &RecordSchema,
    ) -> Result<Self, DatasetError> {
        let fields = format.split_line(raw.trim_end_matches(['\r', '\n']));
        let found = fields.len();

        if found < schema.min_fields() || found > schema.max_fields() {
            return Err(DatasetError::MalformedRecord {
                line,
                found,
                min: schema.min_fields(),
                max: schema.max_fields(),
            });
        }

        Ok(Self { line, fields })
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Overwrite a field; returns false when the record has no such field
    pub fn set_field(&mut self, index: usize, value: String) -> bool {
        match self.fields.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
