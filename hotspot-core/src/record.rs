//! Input rows and their decoding into `(key, weight)` records.

use std::num::ParseIntError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One undecoded input row: the text of each field, header excluded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub fields: Vec<String>,
}

impl RawRecord {
    #[must_use]
    pub fn new(key: impl Into<String>, weight: impl Into<String>) -> Self {
        Self {
            fields: vec![key.into(), weight.into()],
        }
    }

    #[must_use]
    pub fn from_fields(fields: Vec<String>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }
}

/// A decoded record: a document key and the weight it contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub key: u32,
    pub weight: i64,
}

impl Record {
    #[must_use]
    pub const fn new(key: u32, weight: i64) -> Self {
        Self { key, weight }
    }
}

/// Why a row could not be decoded. Always recoverable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("row has no DocumentID field")]
    MissingKey,
    #[error("Error parsing DocumentID {text}: {source}")]
    InvalidKey {
        text: String,
        #[source]
        source: ParseIntError,
    },
    #[error("DocumentID {text} is outside the 32-bit range")]
    KeyOutOfRange { text: String },
    #[error("row for DocumentID {key} has no count field")]
    MissingWeight { key: u32 },
    #[error("Error parsing count for DocumentID {key}: {source}")]
    InvalidWeight {
        key: u32,
        #[source]
        source: ParseIntError,
    },
}

impl TryFrom<&RawRecord> for Record {
    type Error = RecordError;

    fn try_from(raw: &RawRecord) -> Result<Self, Self::Error> {
        let key_text = raw.field(0).ok_or(RecordError::MissingKey)?;
        let key = parse_key(key_text)?;
        let weight_text = raw.field(1).ok_or(RecordError::MissingWeight { key })?;
        let weight = weight_text
            .trim()
            .parse::<i64>()
            .map_err(|source| RecordError::InvalidWeight { key, source })?;
        Ok(Self { key, weight })
    }
}

/// Decode a document key.
///
/// Keys exported from signed `int4` columns arrive negative; those keep their
/// bit pattern so they hash like the database does.
///
/// # Errors
///
/// Returns an error if the text is not an integer in `i32::MIN..=u32::MAX`.
pub fn parse_key(text: &str) -> Result<u32, RecordError> {
    let trimmed = text.trim();
    let value = trimmed
        .parse::<i64>()
        .map_err(|source| RecordError::InvalidKey {
            text: trimmed.to_string(),
            source,
        })?;
    u32::try_from(value)
        .or_else(|_| i32::try_from(value).map(i32::cast_unsigned))
        .map_err(|_| RecordError::KeyOutOfRange {
            text: trimmed.to_string(),
        })
}
