//! Codec error types.
//!
//! Decoding never leaves partial state behind: every error below is
//! raised before any document, log, or session mutation happens.

use thiserror::Error;

/// Errors raised while encoding or decoding documents, change bundles,
/// sync messages, and cursor tokens.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CodecError {
    /// The input does not start with the document magic bytes
    #[error("bad magic bytes: {got:02x?}")]
    BadMagic {
        /// The four bytes found at offset 0
        got: [u8; 4],
    },

    /// The format version is not the single supported value
    #[error("unsupported format version {got} (supported: {supported})")]
    UnsupportedVersion { got: u8, supported: u8 },

    /// The input ended before a complete value could be read
    #[error("truncated input while reading {context}")]
    Truncated {
        /// What was being decoded when the input ran out
        context: &'static str,
    },

    /// A chunk body does not match its declared checksum
    #[error("chunk checksum mismatch: expected {expected:08x}, got {got:08x}")]
    ChecksumMismatch { expected: u32, got: u32 },

    /// Bytes remain after the last expected value
    #[error("{count} trailing byte(s) after document end")]
    TrailingBytes { count: usize },

    /// A tag byte has no meaning in this position
    #[error("unknown tag {tag} while reading {context}")]
    UnknownTag { context: &'static str, tag: u8 },

    /// A decoded value is structurally impossible
    #[error("invalid {context}: {reason}")]
    InvalidValue {
        context: &'static str,
        reason: String,
    },

    /// A length prefix exceeds the remaining input
    #[error("declared length {declared} exceeds remaining {remaining} bytes ({context})")]
    LengthOverflow {
        context: &'static str,
        declared: usize,
        remaining: usize,
    },

    /// A change in a document chunk references a dependency that does not
    /// precede it
    #[error("change {index} depends on a change not yet decoded")]
    DependencyOrder { index: usize },
}

impl CodecError {
    /// Check if this error indicates input that ended too early.
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            CodecError::Truncated { .. } | CodecError::LengthOverflow { .. }
        )
    }

    /// Check if this error indicates an unsupported or foreign format.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            CodecError::BadMagic { .. } | CodecError::UnsupportedVersion { .. }
        )
    }
}
