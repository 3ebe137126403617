//! Error types for DFB encoding and decoding

use thiserror::Error;

/// Errors in the top-level structure of a document.
///
/// Any of these aborts decoding; no entries are returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// First line is not `DFB V1`.
    ///
    /// Trailing whitespace after `DFB V1` (a CRLF document's `\r`) and a
    /// leading byte order mark are accepted. Leading whitespace and any other
    /// text are not.
    #[error("Invalid DFB header: expected 'DFB V1', got {found:?}")]
    InvalidHeader { found: String },

    /// Control block ended without a usable `SEPARATOR:` line
    #[error("No separator found in control block")]
    MissingSeparator,
}

/// Why a filename was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsafeReason {
    /// Name is empty
    Empty,
    /// Name starts at a filesystem root
    Absolute,
    /// Name contains `..`
    ParentDirectory,
    /// Name contains `:` (drive letters, alternate streams)
    Colon,
    /// Name contains a line break and cannot be framed
    LineBreak,
    /// Name starts or ends with whitespace, which metadata values drop
    SurroundingWhitespace,
}

impl std::fmt::Display for UnsafeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnsafeReason::Empty => write!(f, "empty name"),
            UnsafeReason::Absolute => write!(f, "absolute path"),
            UnsafeReason::ParentDirectory => write!(f, "contains '..'"),
            UnsafeReason::Colon => write!(f, "contains ':'"),
            UnsafeReason::LineBreak => write!(f, "contains a line break"),
            UnsafeReason::SurroundingWhitespace => write!(f, "leading or trailing whitespace"),
        }
    }
}

/// A failure scoped to one entry block.
///
/// `index` is the 0-based position of the entry block in the document.
/// Decoding continues past these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("Entry #{index}: missing FILENAME in metadata")]
    MissingFilename { index: usize },

    #[error("Entry #{index}: invalid filename '{name}' ({reason})")]
    UnsafeFilename {
        index: usize,
        name: String,
        reason: UnsafeReason,
    },

    #[error("Entry #{index}: invalid base64 data for '{name}': {source}")]
    Base64Decode {
        index: usize,
        name: String,
        #[source]
        source: base64::DecodeError,
    },
}

impl EntryError {
    /// Position of the offending entry block
    pub fn index(&self) -> usize {
        match self {
            EntryError::MissingFilename { index }
            | EntryError::UnsafeFilename { index, .. }
            | EntryError::Base64Decode { index, .. } => *index,
        }
    }

    /// Filename of the offending entry, when one was given
    pub fn filename(&self) -> Option<&str> {
        match self {
            EntryError::MissingFilename { .. } => None,
            EntryError::UnsafeFilename { name, .. } | EntryError::Base64Decode { name, .. } => {
                Some(name)
            }
        }
    }
}

/// An entry that cannot be written into a document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Cannot store '{name}': {reason}")]
    UnsafeFilename { name: String, reason: UnsafeReason },

    #[error("File {name} is not valid UTF-8 but not marked as base64")]
    NotUtf8 { name: String },

    #[error("Invalid separator token {separator:?}")]
    InvalidSeparator { separator: String },

    #[error("File {name}: metadata key {key:?} cannot be written")]
    InvalidMetadata { name: String, key: String },
}
