//!
//! Tandem: a collaborative document engine.
//!
//! A `Document` holds one logical tree of maps, lists, text sequences and
//! counters. Any number of replicas may edit their own copy offline; a
//! `merge` or a sync exchange brings all of them to byte-identical state
//! with no human conflict resolution.
//!
//! ## Core Concepts
//!
//! * **Operations (`change::Op`)**: The smallest unit of editing, stamped
//!   with a Lamport [`ident::OpId`]. Operations are immutable once issued.
//! * **Changes (`change::Change`)**: A content-addressed bundle of one
//!   actor's operations plus the hashes of the changes it depends on.
//!   Changes form a Merkle-DAG whose frontier is the document's *heads*.
//! * **Object store (`object::ObjectStore`)**: The materialised view of the
//!   change log as a typed tree, rebuilt deterministically on any replica
//!   holding the same set of changes.
//! * **Codec (`codec`)**: A compact self-describing byte format for whole
//!   documents, single change bundles, and sync messages.
//! * **Sync (`sync`)**: Per-peer sessions that exchange only the changes
//!   the other side is missing.
//! * **Cursors (`cursor`)**: Opaque tokens that keep pointing at the same
//!   logical position in a sequence while other replicas edit around it.
//!
//! The [`Document`] type in [`doc`] ties all of these together and is the
//! only surface most callers need.

pub mod change;
pub mod codec;
pub mod cursor;
pub mod doc;
pub mod ident;
pub mod object;
pub mod sync;

/// Re-export the `Document` struct for easier access.
pub use doc::Document;

/// Result type used throughout the Tandem library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Tandem library.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structured errors from actor and operation-id management
    #[error(transparent)]
    Ident(#[from] ident::IdentError),

    /// Structured errors from the change log
    #[error(transparent)]
    Change(#[from] change::ChangeError),

    /// Structured errors from the object store
    #[error(transparent)]
    Object(#[from] object::ObjectError),

    /// Structured errors from encoding and decoding
    #[error(transparent)]
    Codec(#[from] codec::CodecError),

    /// Structured errors from the sync engine
    #[error(transparent)]
    Sync(#[from] sync::SyncError),

    /// Structured errors from the document façade (paths, ranges, cursors)
    #[error(transparent)]
    Doc(#[from] doc::DocError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Ident(_) => "ident",
            Error::Change(_) => "change",
            Error::Object(_) => "object",
            Error::Codec(_) => "codec",
            Error::Sync(_) => "sync",
            Error::Doc(_) => "doc",
        }
    }

    /// Check if this error stems from malformed caller input (invalid
    /// path, range, key, or index).
    pub fn is_validation_error(&self) -> bool {
        match self {
            Error::Doc(e) => e.is_validation_error(),
            Error::Object(e) => e.is_type_error(),
            _ => false,
        }
    }

    /// Check if this error stems from decoding bytes.
    pub fn is_codec_error(&self) -> bool {
        matches!(self, Error::Codec(_))
    }

    /// Check if this error indicates a change whose parents are missing.
    pub fn is_causality_error(&self) -> bool {
        match self {
            Error::Change(e) => e.is_missing_dependency(),
            _ => false,
        }
    }

    /// Check if this error indicates a sync protocol violation.
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Error::Sync(_))
    }
}
