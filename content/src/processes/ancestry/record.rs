//!
//! The leaf record line format.
//!
//! ```text
//! record := '[' id ( ',' ' '* id )* ']'
//! id     := [0-9]+            (fits in u64)
//! ```
//!
//! The first id is the leaf and the last one is the root. Lines are written without spaces,
//! while the parser accepts spaces after each comma. Record files are ASCII, so any other
//! byte is a syntax error of its own line.
//!

use crate::model::content::ContentId;
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordParseErrorKind {
    MissingOpenBracket,
    MissingCloseBracket,
    EmptyRecord,
    ExpectedId,
    ExpectedSeparator,
    IdOutOfRange,
    TrailingCharacters,
    NonAscii,
}

impl Display for RecordParseErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecordParseErrorKind::MissingOpenBracket => "expected '['",
            RecordParseErrorKind::MissingCloseBracket => "missing closing ']'",
            RecordParseErrorKind::EmptyRecord => "record has no ids",
            RecordParseErrorKind::ExpectedId => "expected a decimal id",
            RecordParseErrorKind::ExpectedSeparator => "expected ',' or ']'",
            RecordParseErrorKind::IdOutOfRange => "id does not fit in 64 bits",
            RecordParseErrorKind::TrailingCharacters => "unexpected characters after ']'",
            RecordParseErrorKind::NonAscii => "non-ASCII byte",
        };
        f.write_str(s)
    }
}

/// A record syntax error. `column` is 1-based and counts bytes.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("{kind} at column {column}")]
pub struct RecordParseError {
    pub column: usize,
    pub kind: RecordParseErrorKind,
}

impl RecordParseError {
    fn at(index: usize, kind: RecordParseErrorKind) -> Self {
        Self { column: index + 1, kind }
    }
}

/// Parses one raw record line into ids ordered leaf first. A trailing `\r` is ignored.
pub fn parse_record(line: impl AsRef<[u8]>) -> Result<Vec<ContentId>, RecordParseError> {
    use RecordParseErrorKind::*;

    let line = line.as_ref();
    let bytes = line.strip_suffix(b"\r").unwrap_or(line);
    if let Some(index) = bytes.iter().position(|b| !b.is_ascii()) {
        return Err(RecordParseError::at(index, NonAscii));
    }
    if bytes.first() != Some(&b'[') {
        return Err(RecordParseError::at(0, MissingOpenBracket));
    }
    let mut pos = 1;
    match bytes.get(pos) {
        None => return Err(RecordParseError::at(pos, MissingCloseBracket)),
        Some(b']') => return Err(RecordParseError::at(pos, EmptyRecord)),
        Some(_) => {}
    }

    let mut ids = Vec::new();
    loop {
        let start = pos;
        let mut value = 0u64;
        while let Some(digit @ b'0'..=b'9') = bytes.get(pos).copied() {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add((digit - b'0') as u64))
                .ok_or(RecordParseError::at(start, IdOutOfRange))?;
            pos += 1;
        }
        if pos == start {
            let kind = if pos == bytes.len() { MissingCloseBracket } else { ExpectedId };
            return Err(RecordParseError::at(pos, kind));
        }
        ids.push(ContentId::new(value));

        match bytes.get(pos) {
            None => return Err(RecordParseError::at(pos, MissingCloseBracket)),
            Some(b',') => {
                pos += 1;
                while bytes.get(pos) == Some(&b' ') {
                    pos += 1;
                }
            }
            Some(b']') => {
                pos += 1;
                if pos != bytes.len() {
                    return Err(RecordParseError::at(pos, TrailingCharacters));
                }
                return Ok(ids);
            }
            Some(_) => return Err(RecordParseError::at(pos, ExpectedSeparator)),
        }
    }
}

/// Formats ids (leaf first) as a record line without the line terminator
pub fn format_record(ids: impl IntoIterator<Item = ContentId>) -> String {
    let mut line = String::from("[");
    for (i, id) in ids.into_iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        line.push_str(&id.to_string());
    }
    line.push(']');
    line
}
