//! Restartable record sources.

use std::convert::Infallible;
use std::io::{self, BufRead, Seek, SeekFrom};

use thiserror::Error;

use crate::RecordSource;
use crate::numbers::usize_to_u64;
use crate::record::{RawRecord, Record};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("input has no header row")]
    MissingHeader,
}

/// Line-oriented CSV reader over any seekable input.
///
/// The first line of every pass is a header, discarded by `read_header`.
/// Blank lines are skipped; `"`-quoted fields may contain commas and doubled
/// quotes.
/// Positions are byte offsets into the input.
#[derive(Debug)]
pub struct CsvSource<R> {
    reader: R,
    position: u64,
    total_len: u64,
    line: Vec<u8>,
}

impl<R: BufRead + Seek> CsvSource<R> {
    /// Wrap a reader, measuring its length for progress reporting.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader cannot be repositioned.
    pub fn new(mut reader: R) -> Result<Self, SourceError> {
        let total_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader,
            position: 0,
            total_len,
            line: Vec::new(),
        })
    }

    /// Read the next physical line into the buffer; `false` at end of input.
    ///
    /// Lines are raw bytes so that a row with invalid UTF-8 fails to decode
    /// as a record instead of failing the read.
    fn advance_line(&mut self) -> Result<bool, SourceError> {
        self.line.clear();
        let read = self.reader.read_until(b'\n', &mut self.line)?;
        self.position += usize_to_u64(read);
        Ok(read > 0)
    }

    #[must_use]
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: BufRead + Seek> RecordSource for CsvSource<R> {
    type Error = SourceError;

    fn rewind(&mut self) -> Result<(), Self::Error> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.position = 0;
        Ok(())
    }

    fn read_header(&mut self) -> Result<(), Self::Error> {
        if self.advance_line()? {
            Ok(())
        } else {
            Err(SourceError::MissingHeader)
        }
    }

    fn next_record(&mut self) -> Result<Option<RawRecord>, Self::Error> {
        while self.advance_line()? {
            let text = String::from_utf8_lossy(&self.line);
            let line = text.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(RawRecord::from_fields(split_fields(line))));
        }
        Ok(None)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn total_len(&self) -> u64 {
        self.total_len
    }
}

/// Split one CSV line into fields.
#[must_use]
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(ch),
        }
    }
    fields.push(field);
    fields
}

/// In-memory rows with no header. Positions count rows.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: Vec<RawRecord>,
    cursor: usize,
}

impl MemorySource {
    #[must_use]
    pub fn new(rows: Vec<RawRecord>) -> Self {
        Self { rows, cursor: 0 }
    }

    /// Build a source from already decoded records.
    #[must_use]
    pub fn from_records(records: &[Record]) -> Self {
        Self::new(
            records
                .iter()
                .map(|r| RawRecord::new(r.key.to_string(), r.weight.to_string()))
                .collect(),
        )
    }
}

impl RecordSource for MemorySource {
    type Error = Infallible;

    fn rewind(&mut self) -> Result<(), Self::Error> {
        self.cursor = 0;
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<RawRecord>, Self::Error> {
        let row = self.rows.get(self.cursor).cloned();
        if row.is_some() {
            self.cursor += 1;
        }
        Ok(row)
    }

    fn position(&self) -> u64 {
        usize_to_u64(self.cursor)
    }

    fn total_len(&self) -> u64 {
        usize_to_u64(self.rows.len())
    }
}
