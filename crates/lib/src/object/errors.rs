//! Object-store error types.

use thiserror::Error;

/// Errors from applying operations to, or reading from, the object tree.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ObjectError {
    /// The operation targets an object that does not exist
    #[error("invalid target object {obj}")]
    InvalidTarget {
        /// Display form of the missing object id
        obj: String,
    },

    /// The operation is inappropriate for the object's kind
    #[error("type mismatch on {obj}: expected {expected}, found {actual}")]
    TypeMismatch {
        obj: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A sequence operation references an element that is not in the
    /// sequence
    #[error("element {elem} not found in {obj}")]
    ElementNotFound { obj: String, elem: String },

    /// The operation's shape is impossible for its target (wrong key
    /// kind, missing key, mark on a non-text object)
    #[error("invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// Internal invariant violation; never produces incorrect state, but
    /// the operation that detected it is refused
    #[error("object store corrupt: {reason}")]
    Corrupt { reason: String },
}

impl ObjectError {
    /// Check if this error is a kind mismatch.
    pub fn is_type_error(&self) -> bool {
        matches!(self, ObjectError::TypeMismatch { .. })
    }

    /// Check if this error means the target object or element is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ObjectError::InvalidTarget { .. } | ObjectError::ElementNotFound { .. }
        )
    }
}
