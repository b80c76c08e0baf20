//! Document façade error types.

use thiserror::Error;

use super::path::PathError;

/// Errors raised by the document façade for malformed caller input.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DocError {
    /// The path does not resolve to an object of the needed kind
    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The path string itself is malformed
    #[error(transparent)]
    Path(#[from] PathError),

    /// The key is not present in the map
    #[error("key '{key}' not found")]
    KeyNotFound { key: String },

    /// The index is outside the live element range
    #[error("index {index} out of bounds (length {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// The position is not a valid splice or cursor target
    #[error("invalid index {index} (length {len})")]
    InvalidIndex { index: usize, len: usize },

    /// The mark range is empty or outside the text
    #[error("invalid range {start}..{end} (length {len})")]
    InvalidRange {
        start: usize,
        end: usize,
        len: usize,
    },

    /// The cursor token references an element this document has never
    /// seen
    #[error("unknown cursor")]
    UnknownCursor,
}

impl DocError {
    /// All façade errors are caller-input validation failures.
    pub fn is_validation_error(&self) -> bool {
        true
    }
}
