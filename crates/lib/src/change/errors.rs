//! Change-log error types.

use thiserror::Error;

use super::ChangeHash;

/// Errors from building changes and applying them to the log.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ChangeError {
    /// A change was applied before one of its declared parents
    #[error("missing dependency {missing}")]
    MissingDependency {
        /// The parent hash that is not present in the log
        missing: ChangeHash,
    },

    /// `changes_since` was asked about a head this log has never seen
    #[error("unknown head {head}")]
    UnknownHead { head: ChangeHash },

    /// A change's operations do not line up with its declared id range
    #[error("invalid change: {reason}")]
    InvalidChange { reason: String },
}

impl ChangeError {
    /// Check if this error means a parent change has not arrived yet.
    pub fn is_missing_dependency(&self) -> bool {
        matches!(self, ChangeError::MissingDependency { .. })
    }
}
