//! Identifier-specific error types.

use thiserror::Error;

/// Errors from actor and op-id management.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum IdentError {
    /// The local actor cannot be replaced once it has issued operations
    #[error("actor already issued {issued} operation(s) in this session")]
    ActorInUse {
        /// Number of operations issued under the current actor
        issued: u64,
    },

    /// Actor ids must be non-empty byte strings
    #[error("actor id cannot be empty")]
    EmptyActor,
}
