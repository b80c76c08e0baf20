//! Sync error types.

use thiserror::Error;

use crate::codec::CodecError;

/// Errors from sync sessions.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SyncError {
    /// The message bytes violate the envelope format. The session and the
    /// document are untouched and the session may be resumed.
    #[error("protocol error: {source}")]
    Protocol {
        #[from]
        source: CodecError,
    },

    /// The session handle does not name a live session of this document
    #[error("sync session {id} not found")]
    InvalidSession { id: u64 },

    /// A change carried by a well-formed message was rejected by the
    /// document (corrupt operations); nothing was applied
    #[error("peer change rejected: {reason}")]
    ChangeRejected { reason: String },
}

impl SyncError {
    /// Check if this error is a wire-format violation.
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, SyncError::Protocol { .. })
    }
}
