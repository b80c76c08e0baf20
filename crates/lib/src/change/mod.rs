//!
//! Operations and content-addressed change bundles.
//!
//! A [`Change`] is the atomic unit of replication: a contiguous run of one
//! actor's operations together with the hashes of the changes it causally
//! depends on. Its [`ChangeHash`] is the SHA-256 of its canonical binary
//! body, so identical content always produces the identical hash, and the
//! hash covers the operations, the author, the dependency hashes, and the
//! per-actor sequence number.
//!
//! Changes are immutable once built. The ops inside a change carry ids
//! `(start_op + i, actor)`; the canonical encoding stores only `start_op`
//! and derives the rest, which keeps the body compact and makes it
//! impossible for a decoded change to disagree with itself.

pub mod errors;
pub mod log;

pub use errors::ChangeError;
pub use log::ChangeLog;

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::codec::errors::CodecError;
use crate::codec::wire::{Decoder, Encoder};
use crate::ident::{ActorId, ElemId, ObjId, OpId};
use crate::object::marks::{Expand, MarkAnchor, MarkData};
use crate::object::value::ScalarValue;
use crate::object::ObjKind;

/// 32-byte content hash of a change.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeHash(pub [u8; 32]);

impl ChangeHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ChangeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ChangeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChangeHash({self})")
    }
}

impl Serialize for ChangeHash {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChangeHash {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.len() != 64 {
            return Err(serde::de::Error::custom("change hash must be 64 hex chars"));
        }
        let mut out = [0u8; 32];
        for (i, chunk) in out.iter_mut().enumerate() {
            *chunk = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(serde::de::Error::custom)?;
        }
        Ok(ChangeHash(out))
    }
}

/// Where an operation lands inside its target object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpKey {
    /// A string key in a map.
    Map(String),
    /// A position in a sequence (the element to act on, or to insert after).
    Elem(ElemId),
}

/// What an operation does.
#[derive(Debug, Clone, PartialEq)]
pub enum OpAction {
    /// Create a child object and reference it from the parent.
    MakeObject(ObjKind),
    /// Write a scalar into a map register.
    Set(ScalarValue),
    /// Insert a new scalar element after the keyed position.
    Insert(ScalarValue),
    /// Tombstone a map register or sequence element.
    Delete,
    /// Add a delta to a counter.
    Increment(i64),
    /// Attach (or, with a null value, clear) a formatting mark on text.
    Mark(MarkData),
}

impl OpAction {
    /// Short name for tracing output.
    pub fn kind(&self) -> &'static str {
        match self {
            OpAction::MakeObject(_) => "make",
            OpAction::Set(_) => "set",
            OpAction::Insert(_) => "insert",
            OpAction::Delete => "delete",
            OpAction::Increment(_) => "increment",
            OpAction::Mark(_) => "mark",
        }
    }
}

/// One immutable operation.
///
/// `pred` lists the op ids this operation supersedes: the overwritten
/// register entries for map writes, or the tombstoned element for
/// sequence deletes. `key` is `None` only for increments aimed directly
/// at a counter object.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub id: OpId,
    pub obj: ObjId,
    pub key: Option<OpKey>,
    pub action: OpAction,
    pub pred: Vec<OpId>,
}

/// An atomically-applied bundle of one actor's operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    actor: ActorId,
    seq: u64,
    start_op: u64,
    deps: Vec<ChangeHash>,
    ops: Vec<Op>,
    hash: ChangeHash,
}

impl Change {
    /// Build a change, validating that op ids form the contiguous run
    /// `(start_op + i, actor)` and computing the content hash.
    pub fn new(
        actor: ActorId,
        seq: u64,
        start_op: u64,
        mut deps: Vec<ChangeHash>,
        ops: Vec<Op>,
    ) -> Result<Self, ChangeError> {
        if start_op == 0 {
            return Err(ChangeError::InvalidChange {
                reason: "start_op must be at least 1".to_string(),
            });
        }
        for (i, op) in ops.iter().enumerate() {
            if op.id.actor != actor || op.id.counter != start_op + i as u64 {
                return Err(ChangeError::InvalidChange {
                    reason: format!(
                        "op {} has id {}, expected ({}, change actor)",
                        i,
                        op.id,
                        start_op + i as u64
                    ),
                });
            }
        }
        deps.sort();
        deps.dedup();
        let mut change = Self {
            actor,
            seq,
            start_op,
            deps,
            ops,
            hash: ChangeHash([0; 32]),
        };
        change.hash = hash_body(&change.body_bytes());
        Ok(change)
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    /// Position of this change in its actor's own history (1-based).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Counter of the first op in this change.
    pub fn start_op(&self) -> u64 {
        self.start_op
    }

    /// Counter of the last op in this change (equals `start_op` for a
    /// change carrying a single op).
    pub fn max_op(&self) -> u64 {
        self.start_op + self.ops.len().saturating_sub(1) as u64
    }

    /// Parent hashes, sorted.
    pub fn deps(&self) -> &[ChangeHash] {
        &self.deps
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn hash(&self) -> ChangeHash {
        self.hash
    }

    /// Canonical binary body. This is the hashed representation and also
    /// what document chunks and sync messages embed.
    pub fn body_bytes(&self) -> Vec<u8> {
        let mut actors = vec![self.actor.clone()];
        for op in &self.ops {
            collect_op_actors(op, &mut actors);
        }

        let mut enc = Encoder::new();
        enc.uleb(actors.len() as u64);
        for actor in &actors {
            enc.bytes(actor.as_bytes());
        }
        enc.uleb(self.seq);
        enc.uleb(self.start_op);
        enc.uleb(self.deps.len() as u64);
        for dep in &self.deps {
            enc.hash(dep.as_bytes());
        }
        enc.uleb(self.ops.len() as u64);
        // Column groups: objects, keys, actions, predecessors.
        for op in &self.ops {
            encode_obj(&mut enc, &op.obj, &actors);
        }
        for op in &self.ops {
            encode_key(&mut enc, op.key.as_ref(), &actors);
        }
        for op in &self.ops {
            encode_action(&mut enc, &op.action, &actors);
        }
        for op in &self.ops {
            enc.uleb(op.pred.len() as u64);
            for pred in &op.pred {
                encode_opid(&mut enc, pred, &actors);
            }
        }
        enc.into_bytes()
    }

    /// Decode a canonical change body. The hash is recomputed from the
    /// bytes, so a decoded change can never disagree with its own id.
    pub fn from_body(body: &[u8]) -> Result<Self, CodecError> {
        let mut dec = Decoder::new(body);
        let change = Self::decode_body(&mut dec)?;
        dec.finish()?;
        Ok(change)
    }

    pub(crate) fn decode_body(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        let start = dec.clone();

        let actor_count = dec.count("change actor table")?;
        if actor_count == 0 {
            return Err(CodecError::InvalidValue {
                context: "change actor table",
                reason: "must contain at least the change actor".to_string(),
            });
        }
        let mut actors = Vec::with_capacity(actor_count);
        for _ in 0..actor_count {
            let raw = dec.bytes("change actor")?;
            let actor = ActorId::from_bytes(raw).map_err(|_| CodecError::InvalidValue {
                context: "change actor",
                reason: "empty actor id".to_string(),
            })?;
            actors.push(actor);
        }
        let actor = actors[0].clone();

        let seq = dec.uleb("change seq")?;
        let start_op = dec.uleb("change start_op")?;
        if start_op == 0 {
            return Err(CodecError::InvalidValue {
                context: "change start_op",
                reason: "must be at least 1".to_string(),
            });
        }
        let dep_count = dec.count("change deps")?;
        let mut deps = Vec::with_capacity(dep_count);
        for _ in 0..dep_count {
            deps.push(ChangeHash(dec.hash("change dep")?));
        }

        let op_count = dec.count("change ops")?;
        let mut objs = Vec::with_capacity(op_count);
        for _ in 0..op_count {
            objs.push(decode_obj(dec, &actors)?);
        }
        let mut keys = Vec::with_capacity(op_count);
        for _ in 0..op_count {
            keys.push(decode_key(dec, &actors)?);
        }
        let mut actions = Vec::with_capacity(op_count);
        for _ in 0..op_count {
            actions.push(decode_action(dec, &actors)?);
        }
        let mut preds = Vec::with_capacity(op_count);
        for _ in 0..op_count {
            let n = dec.count("op pred")?;
            let mut pred = Vec::with_capacity(n);
            for _ in 0..n {
                pred.push(decode_opid(dec, &actors)?);
            }
            preds.push(pred);
        }

        let mut ops = Vec::with_capacity(op_count);
        for (i, ((obj, key), (action, pred))) in objs
            .into_iter()
            .zip(keys)
            .zip(actions.into_iter().zip(preds))
            .enumerate()
        {
            ops.push(Op {
                id: OpId::new(start_op + i as u64, actor.clone()),
                obj,
                key,
                action,
                pred,
            });
        }

        // Hash exactly the bytes this body occupied.
        let consumed = start.remaining() - dec.remaining();
        let body = start.raw_prefix(consumed);
        Ok(Self {
            actor,
            seq,
            start_op,
            deps,
            ops,
            hash: hash_body(body),
        })
    }
}

impl Decoder<'_> {
    /// The next `len` bytes without advancing; used to hash a change body
    /// in place after it has been parsed.
    fn raw_prefix(&self, len: usize) -> &[u8] {
        let mut copy = self.clone();
        copy.raw(len, "change body").unwrap_or(&[])
    }
}

fn hash_body(body: &[u8]) -> ChangeHash {
    let digest = Sha256::digest(body);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    ChangeHash(out)
}

fn intern(actors: &mut Vec<ActorId>, actor: &ActorId) {
    if !actors.contains(actor) {
        actors.push(actor.clone());
    }
}

fn collect_op_actors(op: &Op, actors: &mut Vec<ActorId>) {
    if let ObjId::Op(id) = &op.obj {
        intern(actors, &id.actor);
    }
    if let Some(OpKey::Elem(ElemId::Op(id))) = &op.key {
        intern(actors, &id.actor);
    }
    if let OpAction::Mark(mark) = &op.action {
        for anchor in [&mark.start, &mark.end] {
            if let MarkAnchor::Elem(id) = anchor {
                intern(actors, &id.actor);
            }
        }
    }
    for pred in &op.pred {
        intern(actors, &pred.actor);
    }
}

fn actor_index(actors: &[ActorId], actor: &ActorId) -> u64 {
    actors
        .iter()
        .position(|a| a == actor)
        .expect("actor interned before encoding") as u64
}

fn encode_opid(enc: &mut Encoder, id: &OpId, actors: &[ActorId]) {
    enc.uleb(actor_index(actors, &id.actor));
    enc.uleb(id.counter);
}

fn decode_opid(dec: &mut Decoder<'_>, actors: &[ActorId]) -> Result<OpId, CodecError> {
    let idx = dec.uleb("opid actor index")? as usize;
    let actor = actors.get(idx).ok_or_else(|| CodecError::InvalidValue {
        context: "opid actor index",
        reason: format!("index {idx} out of range ({} actors)", actors.len()),
    })?;
    let counter = dec.uleb("opid counter")?;
    if counter == 0 {
        return Err(CodecError::InvalidValue {
            context: "opid counter",
            reason: "counter must be at least 1".to_string(),
        });
    }
    Ok(OpId::new(counter, actor.clone()))
}

fn encode_obj(enc: &mut Encoder, obj: &ObjId, actors: &[ActorId]) {
    match obj {
        ObjId::Root => enc.byte(0),
        ObjId::Op(id) => {
            enc.byte(1);
            encode_opid(enc, id, actors);
        }
    }
}

fn decode_obj(dec: &mut Decoder<'_>, actors: &[ActorId]) -> Result<ObjId, CodecError> {
    match dec.byte("object id")? {
        0 => Ok(ObjId::Root),
        1 => Ok(ObjId::Op(decode_opid(dec, actors)?)),
        tag => Err(CodecError::UnknownTag {
            context: "object id",
            tag,
        }),
    }
}

fn encode_key(enc: &mut Encoder, key: Option<&OpKey>, actors: &[ActorId]) {
    match key {
        None => enc.byte(0),
        Some(OpKey::Map(s)) => {
            enc.byte(1);
            enc.str(s);
        }
        Some(OpKey::Elem(ElemId::Head)) => enc.byte(2),
        Some(OpKey::Elem(ElemId::Op(id))) => {
            enc.byte(3);
            encode_opid(enc, id, actors);
        }
    }
}

fn decode_key(dec: &mut Decoder<'_>, actors: &[ActorId]) -> Result<Option<OpKey>, CodecError> {
    match dec.byte("op key")? {
        0 => Ok(None),
        1 => Ok(Some(OpKey::Map(dec.str("map key")?))),
        2 => Ok(Some(OpKey::Elem(ElemId::Head))),
        3 => Ok(Some(OpKey::Elem(ElemId::Op(decode_opid(dec, actors)?)))),
        tag => Err(CodecError::UnknownTag {
            context: "op key",
            tag,
        }),
    }
}

fn encode_kind(enc: &mut Encoder, kind: ObjKind) {
    enc.byte(match kind {
        ObjKind::Map => 0,
        ObjKind::List => 1,
        ObjKind::Text => 2,
        ObjKind::Counter => 3,
    });
}

fn decode_kind(dec: &mut Decoder<'_>) -> Result<ObjKind, CodecError> {
    match dec.byte("object kind")? {
        0 => Ok(ObjKind::Map),
        1 => Ok(ObjKind::List),
        2 => Ok(ObjKind::Text),
        3 => Ok(ObjKind::Counter),
        tag => Err(CodecError::UnknownTag {
            context: "object kind",
            tag,
        }),
    }
}

pub(crate) fn encode_scalar(enc: &mut Encoder, value: &ScalarValue) {
    match value {
        ScalarValue::Null => enc.byte(0),
        ScalarValue::Bool(b) => {
            enc.byte(1);
            enc.byte(u8::from(*b));
        }
        ScalarValue::Int(n) => {
            enc.byte(2);
            enc.ileb(*n);
        }
        ScalarValue::Uint(n) => {
            enc.byte(3);
            enc.uleb(*n);
        }
        ScalarValue::F64(x) => {
            enc.byte(4);
            enc.f64_bits(*x);
        }
        ScalarValue::Str(s) => {
            enc.byte(5);
            enc.str(s);
        }
        ScalarValue::Bytes(b) => {
            enc.byte(6);
            enc.bytes(b);
        }
        ScalarValue::Counter(n) => {
            enc.byte(7);
            enc.ileb(*n);
        }
        ScalarValue::Timestamp(n) => {
            enc.byte(8);
            enc.ileb(*n);
        }
    }
}

pub(crate) fn decode_scalar(dec: &mut Decoder<'_>) -> Result<ScalarValue, CodecError> {
    match dec.byte("scalar tag")? {
        0 => Ok(ScalarValue::Null),
        1 => match dec.byte("bool")? {
            0 => Ok(ScalarValue::Bool(false)),
            1 => Ok(ScalarValue::Bool(true)),
            tag => Err(CodecError::UnknownTag {
                context: "bool",
                tag,
            }),
        },
        2 => Ok(ScalarValue::Int(dec.ileb("int")?)),
        3 => Ok(ScalarValue::Uint(dec.uleb("uint")?)),
        4 => Ok(ScalarValue::F64(dec.f64_bits("f64")?)),
        5 => Ok(ScalarValue::Str(dec.str("str")?)),
        6 => Ok(ScalarValue::Bytes(dec.bytes("bytes")?.to_vec())),
        7 => Ok(ScalarValue::Counter(dec.ileb("counter")?)),
        8 => Ok(ScalarValue::Timestamp(dec.ileb("timestamp")?)),
        tag => Err(CodecError::UnknownTag {
            context: "scalar tag",
            tag,
        }),
    }
}

fn encode_anchor(enc: &mut Encoder, anchor: &MarkAnchor, actors: &[ActorId]) {
    match anchor {
        MarkAnchor::Start => enc.byte(0),
        MarkAnchor::End => enc.byte(1),
        MarkAnchor::Elem(id) => {
            enc.byte(2);
            encode_opid(enc, id, actors);
        }
    }
}

fn decode_anchor(dec: &mut Decoder<'_>, actors: &[ActorId]) -> Result<MarkAnchor, CodecError> {
    match dec.byte("mark anchor")? {
        0 => Ok(MarkAnchor::Start),
        1 => Ok(MarkAnchor::End),
        2 => Ok(MarkAnchor::Elem(decode_opid(dec, actors)?)),
        tag => Err(CodecError::UnknownTag {
            context: "mark anchor",
            tag,
        }),
    }
}

fn encode_action(enc: &mut Encoder, action: &OpAction, actors: &[ActorId]) {
    match action {
        OpAction::MakeObject(kind) => {
            enc.byte(0);
            encode_kind(enc, *kind);
        }
        OpAction::Set(value) => {
            enc.byte(1);
            encode_scalar(enc, value);
        }
        OpAction::Insert(value) => {
            enc.byte(2);
            encode_scalar(enc, value);
        }
        OpAction::Delete => enc.byte(3),
        OpAction::Increment(delta) => {
            enc.byte(4);
            enc.ileb(*delta);
        }
        OpAction::Mark(mark) => {
            enc.byte(5);
            enc.str(&mark.name);
            encode_scalar(enc, &mark.value);
            encode_anchor(enc, &mark.start, actors);
            encode_anchor(enc, &mark.end, actors);
            enc.byte(mark.expand.as_byte());
        }
    }
}

fn decode_action(dec: &mut Decoder<'_>, actors: &[ActorId]) -> Result<OpAction, CodecError> {
    match dec.byte("op action")? {
        0 => Ok(OpAction::MakeObject(decode_kind(dec)?)),
        1 => Ok(OpAction::Set(decode_scalar(dec)?)),
        2 => Ok(OpAction::Insert(decode_scalar(dec)?)),
        3 => Ok(OpAction::Delete),
        4 => Ok(OpAction::Increment(dec.ileb("increment delta")?)),
        5 => {
            let name = dec.str("mark name")?;
            let value = decode_scalar(dec)?;
            let start = decode_anchor(dec, actors)?;
            let end = decode_anchor(dec, actors)?;
            let expand = Expand::from_byte(dec.byte("mark expand")?)?;
            Ok(OpAction::Mark(MarkData {
                name,
                value,
                start,
                end,
                expand,
            }))
        }
        tag => Err(CodecError::UnknownTag {
            context: "op action",
            tag,
        }),
    }
}
