//! Actor and operation identifiers.
//!
//! Every edit is stamped with an [`OpId`], a Lamport pair of a monotonic
//! counter and the opaque [`ActorId`] of the replica that issued it. OpIds
//! order totally by `(counter, actor)`, which is what makes concurrent
//! sequence insertions resolve the same way on every replica.

pub mod errors;

pub use errors::IdentError;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque identifier for one replica or editor session.
///
/// Freshly minted actors are 16 random bytes (a v4 UUID), but any
/// non-empty byte string supplied through `set_actor` is accepted.
/// Cheap to clone; ordering is lexicographic over the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(Arc<[u8]>);

impl ActorId {
    /// Mint a fresh random actor id.
    pub fn random() -> Self {
        Self(Arc::from(uuid::Uuid::new_v4().into_bytes().as_slice()))
    }

    /// Create an actor id from raw bytes.
    ///
    /// Fails with [`IdentError::EmptyActor`] on an empty slice; everything
    /// downstream assumes actors are non-empty.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<Self, IdentError> {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return Err(IdentError::EmptyActor);
        }
        Ok(Self(Arc::from(bytes)))
    }

    /// The raw actor bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl Serialize for ActorId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ActorId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = decode_hex(&s).map_err(serde::de::Error::custom)?;
        ActorId::from_bytes(bytes).map_err(serde::de::Error::custom)
    }
}

fn decode_hex(s: &str) -> std::result::Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err(format!("odd-length hex actor id: {s}"));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| format!("invalid hex actor id: {s}"))
        })
        .collect()
}

/// Lamport identifier of a single operation: `(counter, actor)`.
///
/// A replica's own counters are strictly monotonic, and are bumped past
/// every counter it observes in remote changes, so an op's id always
/// dominates the ids of every op its author had seen when issuing it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpId {
    pub counter: u64,
    pub actor: ActorId,
}

impl OpId {
    pub fn new(counter: u64, actor: ActorId) -> Self {
        Self { counter, actor }
    }
}

impl PartialOrd for OpId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.counter
            .cmp(&other.counter)
            .then_with(|| self.actor.cmp(&other.actor))
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.counter, self.actor)
    }
}

/// Identifier of an object in the document tree.
///
/// The root map has a well-known id; every other object is identified by
/// the op that created it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjId {
    /// The document root (always a Map).
    Root,
    /// An object created by a `MakeObject` operation.
    Op(OpId),
}

impl ObjId {
    pub fn is_root(&self) -> bool {
        matches!(self, ObjId::Root)
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjId::Root => write!(f, "_root"),
            ObjId::Op(id) => write!(f, "{id}"),
        }
    }
}

/// Position reference inside a sequence: either the virtual head slot or
/// the op id of an existing element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElemId {
    /// Before the first element.
    Head,
    /// The element inserted by this op.
    Op(OpId),
}

impl ElemId {
    pub fn as_op(&self) -> Option<&OpId> {
        match self {
            ElemId::Head => None,
            ElemId::Op(id) => Some(id),
        }
    }
}

/// Issues operation ids for the local actor.
///
/// Owned by a document; there is one allocator per document and no shared
/// process state. The allocator tracks the highest counter *seen* (local
/// or remote) so that freshly issued ids dominate everything already in
/// the log.
#[derive(Debug, Clone)]
pub struct OpIdAllocator {
    actor: ActorId,
    max_counter: u64,
    issued: u64,
}

impl OpIdAllocator {
    pub fn new(actor: ActorId) -> Self {
        Self {
            actor,
            max_counter: 0,
            issued: 0,
        }
    }

    /// The local actor.
    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    /// Replace the local actor.
    ///
    /// Must happen before any local operation is issued in this session;
    /// fails with [`IdentError::ActorInUse`] otherwise.
    pub fn set_actor(&mut self, actor: ActorId) -> Result<(), IdentError> {
        if self.issued > 0 {
            return Err(IdentError::ActorInUse {
                issued: self.issued,
            });
        }
        self.actor = actor;
        Ok(())
    }

    /// Reserve `n` consecutive counters and return the id of the first.
    ///
    /// The counter of every issued id is strictly greater than any counter
    /// previously issued or observed.
    pub fn next(&mut self, n: u64) -> OpId {
        debug_assert!(n > 0);
        let start = self.max_counter + 1;
        self.max_counter += n;
        self.issued += n;
        OpId::new(start, self.actor.clone())
    }

    /// Note a counter observed in a remote change (Lamport bump).
    pub fn observe(&mut self, counter: u64) {
        if counter > self.max_counter {
            self.max_counter = counter;
        }
    }

    /// The highest counter seen so far.
    pub fn max_counter(&self) -> u64 {
        self.max_counter
    }
}
