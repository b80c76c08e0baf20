//!
//! The document façade.
//!
//! [`Document`] is the single surface callers interact with: lifecycle
//! (create, load, save, merge, fork), typed operations addressed by
//! [`Path`], rich-text marks, counters, cursors, history access, and
//! sync sessions. Everything here is mechanical plumbing over the core
//! components: the change log, the object store, the codec, and the
//! sync engine do the real work.
//!
//! A document is single-owner: all operations are synchronous and
//! CPU-bound, and callers serialise access themselves. There is no
//! process-wide state; any number of documents coexist independently.

pub mod errors;
pub mod path;

pub use errors::DocError;
pub use path::{Path, PathError, Segment};

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::change::{Change, ChangeError, ChangeHash, ChangeLog, Op, OpAction, OpKey};
use crate::codec;
use crate::cursor::{Bias, Cursor};
use crate::ident::{ActorId, ElemId, ObjId, OpId, OpIdAllocator};
use crate::object::marks::{Expand, Mark, MarkAnchor, MarkData};
use crate::object::value::ScalarValue;
use crate::object::{ObjKind, ObjectError, ObjectStore, Value};
use crate::sync::{SyncError, SyncState};
use crate::Result;

/// A map key or list index, for operations that accept either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prop {
    Key(String),
    Index(usize),
}

impl From<&str> for Prop {
    fn from(key: &str) -> Self {
        Prop::Key(key.to_string())
    }
}

impl From<String> for Prop {
    fn from(key: String) -> Self {
        Prop::Key(key)
    }
}

impl From<usize> for Prop {
    fn from(index: usize) -> Self {
        Prop::Index(index)
    }
}

/// One collaborative document: a change log, its materialised object
/// tree, the local op-id allocator, and any open sync sessions.
#[derive(Debug)]
pub struct Document {
    log: ChangeLog,
    store: ObjectStore,
    alloc: OpIdAllocator,
    sessions: HashMap<u64, SyncState>,
    next_session: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document with a fresh random actor. The root object is an
    /// empty map.
    pub fn new() -> Self {
        Self::with_actor(ActorId::random())
    }

    /// An empty document editing as the given actor.
    pub fn with_actor(actor: ActorId) -> Self {
        Self {
            log: ChangeLog::new(),
            store: ObjectStore::new(),
            alloc: OpIdAllocator::new(actor),
            sessions: HashMap::new(),
            next_session: 1,
        }
    }

    /// Load a document from its binary form, rebuilding the object tree
    /// from the decoded change log. The loaded document edits under a
    /// fresh actor.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let log = codec::decode_document(bytes)?;
        let mut store = ObjectStore::new();
        let mut max_counter = 0u64;
        for change in log.iter() {
            store.check_ops(change.ops())?;
            store.apply_ops(change.ops())?;
            max_counter = max_counter.max(change.max_op());
        }
        let mut alloc = OpIdAllocator::new(ActorId::random());
        alloc.observe(max_counter);
        Ok(Self {
            log,
            store,
            alloc,
            sessions: HashMap::new(),
            next_session: 1,
        })
    }

    /// Serialise the whole document. `load(save())` reproduces the same
    /// heads and materialised state, and saving the loaded copy is
    /// byte-identical.
    pub fn save(&self) -> Vec<u8> {
        codec::encode_document(&self.log)
    }

    /// Pull every change from `other` that this document is missing.
    /// Merging is commutative and idempotent; returns the new heads.
    pub fn merge(&mut self, other: &Document) -> Result<Vec<ChangeHash>> {
        for change in other.log.iter() {
            if !self.log.has(&change.hash()) {
                self.ingest(change.clone())?;
            }
        }
        Ok(self.get_heads())
    }

    /// A copy of this document that edits under a fresh actor. History
    /// and state are shared up to the fork point and diverge after it.
    pub fn fork(&self) -> Self {
        let mut alloc = OpIdAllocator::new(ActorId::random());
        alloc.observe(self.alloc.max_counter());
        Self {
            log: self.log.clone(),
            store: self.store.clone(),
            alloc,
            sessions: HashMap::new(),
            next_session: 1,
        }
    }

    /// Replace the local actor. Must happen before this session issues
    /// any operation.
    pub fn set_actor(&mut self, bytes: impl AsRef<[u8]>) -> Result<()> {
        let actor = ActorId::from_bytes(bytes)?;
        self.alloc.set_actor(actor)?;
        Ok(())
    }

    pub fn get_actor(&self) -> &ActorId {
        self.alloc.actor()
    }

    /// The current frontier of the change DAG.
    pub fn get_heads(&self) -> Vec<ChangeHash> {
        self.log.heads()
    }

    // ----- history ------------------------------------------------------

    /// Apply a single encoded change bundle; returns the new heads.
    pub fn apply_change(&mut self, bytes: &[u8]) -> Result<Vec<ChangeHash>> {
        let change = codec::decode_change(bytes)?;
        if !self.log.has(&change.hash()) {
            self.ingest(change)?;
        }
        Ok(self.get_heads())
    }

    /// Apply several encoded change bundles in order.
    pub fn apply_changes<'a>(
        &mut self,
        bundles: impl IntoIterator<Item = &'a [u8]>,
    ) -> Result<Vec<ChangeHash>> {
        for bundle in bundles {
            self.apply_change(bundle)?;
        }
        Ok(self.get_heads())
    }

    /// The changes a replica holding exactly `have_heads` is missing,
    /// encoded as self-contained bundles in application order.
    pub fn get_changes(&self, have_heads: &[ChangeHash]) -> Result<Vec<Vec<u8>>> {
        let changes = self.log.changes_since(have_heads)?;
        Ok(changes.iter().map(|c| codec::encode_change(c)).collect())
    }

    /// One change by hash, encoded as a bundle.
    pub fn get_change_by_hash(&self, hash: &ChangeHash) -> Option<Vec<u8>> {
        self.log.get(hash).map(codec::encode_change)
    }

    // ----- reads --------------------------------------------------------

    /// Read a map key or list index under `path`.
    pub fn get(&self, path: &Path, prop: impl Into<Prop>) -> Result<Option<Value>> {
        let obj = self.resolve(path)?;
        match prop.into() {
            Prop::Key(key) => Ok(self.store.map_get(&obj, &key)?),
            Prop::Index(index) => Ok(self.store.seq_get(&obj, index)?),
        }
    }

    /// Every concurrently-written value at a map key (the conflict set).
    pub fn get_all(&self, path: &Path, key: &str) -> Result<Vec<Value>> {
        let obj = self.resolve(path)?;
        Ok(self.store.map_get_all(&obj, key)?)
    }

    /// Live keys of the map at `path`, sorted.
    pub fn keys(&self, path: &Path) -> Result<Vec<String>> {
        let obj = self.resolve(path)?;
        Ok(self
            .store
            .map(&obj)?
            .keys()
            .map(|k| k.to_string())
            .collect())
    }

    /// Live values of the list at `path`, in order.
    pub fn list_items(&self, path: &Path) -> Result<Vec<Value>> {
        let obj = self.resolve_seq(path)?;
        Ok(self
            .store
            .seq(&obj)?
            .seq
            .live_iter()
            .map(|e| match &e.value {
                crate::object::sequence::ElemValue::Scalar(s) => Value::Scalar(s.clone()),
                crate::object::sequence::ElemValue::Object(id, kind) => {
                    Value::Object(id.clone(), *kind)
                }
            })
            .collect())
    }

    /// Live length of the object at `path`, per its kind: element count
    /// for lists and text, key count for maps. Counters have no length.
    pub fn length(&self, path: &Path) -> Result<usize> {
        let obj = self.resolve(path)?;
        Ok(self.store.length(&obj)?)
    }

    /// Character length of the text object at `path`.
    pub fn text_len(&self, path: &Path) -> Result<usize> {
        let obj = self.resolve_text(path)?;
        Ok(self.store.text(&obj)?.seq.live_len())
    }

    /// The live characters of the text object at `path`.
    pub fn get_text(&self, path: &Path) -> Result<String> {
        let obj = self.resolve_text(path)?;
        Ok(self.store.text(&obj)?.seq.to_text())
    }

    /// JSON export of the materialised tree. Tombstones are invisible;
    /// counters render as integers, text objects as strings.
    pub fn to_json(&self) -> serde_json::Value {
        self.object_json(&ObjId::Root)
    }

    // ----- map writes ---------------------------------------------------

    /// Write a scalar into the map at `path`.
    pub fn put(&mut self, path: &Path, key: &str, value: impl Into<ScalarValue>) -> Result<()> {
        let obj = self.resolve(path)?;
        let pred = self.store.map_live_ids(&obj, key)?;
        let id = self.alloc.next(1);
        self.commit(vec![Op {
            id,
            obj,
            key: Some(OpKey::Map(key.to_string())),
            action: OpAction::Set(value.into()),
            pred,
        }])?;
        Ok(())
    }

    /// Create a child object under a map key; returns the child's path.
    pub fn put_object(&mut self, path: &Path, key: &str, kind: ObjKind) -> Result<Path> {
        let obj = self.resolve(path)?;
        let pred = self.store.map_live_ids(&obj, key)?;
        let id = self.alloc.next(1);
        self.commit(vec![Op {
            id,
            obj,
            key: Some(OpKey::Map(key.to_string())),
            action: OpAction::MakeObject(kind),
            pred,
        }])?;
        Ok(path.clone().key(key))
    }

    /// Delete a map key or list element.
    pub fn delete(&mut self, path: &Path, prop: impl Into<Prop>) -> Result<()> {
        match prop.into() {
            Prop::Key(key) => {
                let obj = self.resolve(path)?;
                let pred = self.store.map_live_ids(&obj, &key)?;
                if pred.is_empty() {
                    return Err(DocError::KeyNotFound { key }.into());
                }
                let id = self.alloc.next(1);
                self.commit(vec![Op {
                    id,
                    obj,
                    key: Some(OpKey::Map(key)),
                    action: OpAction::Delete,
                    pred,
                }])?;
            }
            Prop::Index(index) => {
                let obj = self.resolve_seq(path)?;
                let seq = &self.store.seq(&obj)?.seq;
                let elem = seq
                    .live_get(index)
                    .ok_or(DocError::IndexOutOfBounds {
                        index,
                        len: seq.live_len(),
                    })?
                    .id
                    .clone();
                let id = self.alloc.next(1);
                self.commit(vec![Op {
                    id,
                    obj,
                    key: Some(OpKey::Elem(ElemId::Op(elem.clone()))),
                    action: OpAction::Delete,
                    pred: vec![elem],
                }])?;
            }
        }
        Ok(())
    }

    // ----- list writes --------------------------------------------------

    /// Insert a scalar into the list at `path` so it lands at `index`.
    pub fn insert(
        &mut self,
        path: &Path,
        index: usize,
        value: impl Into<ScalarValue>,
    ) -> Result<()> {
        let obj = self.resolve_seq(path)?;
        let after = self.insert_anchor(&obj, index)?;
        let id = self.alloc.next(1);
        self.commit(vec![Op {
            id,
            obj,
            key: Some(OpKey::Elem(after)),
            action: OpAction::Insert(value.into()),
            pred: vec![],
        }])?;
        Ok(())
    }

    /// Insert a child object into the list at `path`; returns the
    /// child's path by index (valid until further edits shift it).
    pub fn insert_object(&mut self, path: &Path, index: usize, kind: ObjKind) -> Result<Path> {
        let obj = self.resolve_seq(path)?;
        let after = self.insert_anchor(&obj, index)?;
        let id = self.alloc.next(1);
        self.commit(vec![Op {
            id,
            obj,
            key: Some(OpKey::Elem(after)),
            action: OpAction::MakeObject(kind),
            pred: vec![],
        }])?;
        Ok(path.clone().index(index))
    }

    // ----- text ---------------------------------------------------------

    /// Delete `del` characters at `pos`, then insert `text` there.
    /// Positions count live characters.
    pub fn splice_text(&mut self, path: &Path, pos: usize, del: usize, text: &str) -> Result<()> {
        let obj = self.resolve_text(path)?;
        let seq = &self.store.text(&obj)?.seq;
        let len = seq.live_len();
        if pos > len {
            return Err(DocError::InvalidIndex { index: pos, len }.into());
        }
        if pos + del > len {
            return Err(DocError::InvalidIndex {
                index: pos + del,
                len,
            }
            .into());
        }

        let doomed: Vec<OpId> = (pos..pos + del)
            .filter_map(|i| seq.live_get(i).map(|e| e.id.clone()))
            .collect();
        let insert_chars: Vec<String> = text.chars().map(|c| c.to_string()).collect();
        if doomed.is_empty() && insert_chars.is_empty() {
            return Ok(());
        }
        let mut anchor = if pos == 0 {
            ElemId::Head
        } else {
            ElemId::Op(
                seq.live_get(pos - 1)
                    .ok_or(DocError::InvalidIndex { index: pos, len })?
                    .id
                    .clone(),
            )
        };

        let total = doomed.len() as u64 + insert_chars.len() as u64;
        let first = self.alloc.next(total);
        let mut counter = first.counter;
        let actor = first.actor;
        let mut ops = Vec::with_capacity(total as usize);
        for elem in doomed {
            ops.push(Op {
                id: OpId::new(counter, actor.clone()),
                obj: obj.clone(),
                key: Some(OpKey::Elem(ElemId::Op(elem.clone()))),
                action: OpAction::Delete,
                pred: vec![elem],
            });
            counter += 1;
        }
        for c in insert_chars {
            let id = OpId::new(counter, actor.clone());
            ops.push(Op {
                id: id.clone(),
                obj: obj.clone(),
                key: Some(OpKey::Elem(anchor)),
                action: OpAction::Insert(ScalarValue::Str(c)),
                pred: vec![],
            });
            anchor = ElemId::Op(id);
            counter += 1;
        }
        self.commit(ops)?;
        Ok(())
    }

    /// Replace the whole text content.
    ///
    /// Deprecated: this destroys fine-grained history. Every surviving
    /// character is tombstoned and re-inserted, so concurrent edits merge
    /// poorly. Use [`Self::splice_text`].
    pub fn update_text(&mut self, path: &Path, text: &str) -> Result<()> {
        warn!(
            path = %path,
            "update_text splices over the entire text and destroys edit history; \
             prefer splice_text"
        );
        let len = self.text_len(path)?;
        self.splice_text(path, 0, len, text)
    }

    // ----- counters -----------------------------------------------------

    /// Add `delta` to the counter at `(path, key)`.
    ///
    /// Counters are additive: concurrent increments from replicas that
    /// have never synced still sum after merge. If the key holds a
    /// counter object the increment targets the object; otherwise it
    /// accumulates on the map cell, springing the counter into existence
    /// on first use.
    pub fn increment(&mut self, path: &Path, key: &str, delta: i64) -> Result<()> {
        let obj = self.resolve(path)?;
        match self.store.map_get(&obj, key)? {
            Some(Value::Object(counter_obj, ObjKind::Counter)) => {
                let id = self.alloc.next(1);
                self.commit(vec![Op {
                    id,
                    obj: counter_obj,
                    key: None,
                    action: OpAction::Increment(delta),
                    pred: vec![],
                }])?;
            }
            _ => {
                let pred = self.store.map_live_ids(&obj, key)?;
                let id = self.alloc.next(1);
                self.commit(vec![Op {
                    id,
                    obj,
                    key: Some(OpKey::Map(key.to_string())),
                    action: OpAction::Increment(delta),
                    pred,
                }])?;
            }
        }
        Ok(())
    }

    /// Current value of the counter at `(path, key)`.
    pub fn counter_value(&self, path: &Path, key: &str) -> Result<i64> {
        let obj = self.resolve(path)?;
        match self.store.map_get(&obj, key)? {
            Some(Value::Object(counter_obj, ObjKind::Counter)) => Ok(self
                .store
                .object(&counter_obj)?
                .counter()
                .map(|c| c.value())
                .unwrap_or(0)),
            Some(Value::Scalar(ScalarValue::Counter(n))) => Ok(n),
            Some(Value::Scalar(other)) => Err(ObjectError::TypeMismatch {
                obj: path.clone().key(key).to_string(),
                expected: "counter",
                actual: other.type_name(),
            }
            .into()),
            Some(Value::Object(_, kind)) => Err(ObjectError::TypeMismatch {
                obj: path.clone().key(key).to_string(),
                expected: "counter",
                actual: kind.name(),
            }
            .into()),
            None => Err(DocError::KeyNotFound {
                key: key.to_string(),
            }
            .into()),
        }
    }

    // ----- marks --------------------------------------------------------

    /// Apply a formatting mark over `start..end` of the text at `path`.
    pub fn mark(
        &mut self,
        path: &Path,
        name: &str,
        value: impl Into<ScalarValue>,
        start: usize,
        end: usize,
        expand: Expand,
    ) -> Result<()> {
        self.apply_mark(path, name, value.into(), start, end, expand)
    }

    /// Remove a named mark over `start..end` of the text at `path`.
    pub fn unmark(
        &mut self,
        path: &Path,
        name: &str,
        start: usize,
        end: usize,
        expand: Expand,
    ) -> Result<()> {
        self.apply_mark(path, name, ScalarValue::Null, start, end, expand)
    }

    /// The marks visible at one character index.
    pub fn marks_at(&self, path: &Path, index: usize) -> Result<Vec<Mark>> {
        let obj = self.resolve_text(path)?;
        let state = self.store.text(&obj)?;
        let len = state.seq.live_len();
        if index >= len {
            return Err(DocError::InvalidIndex { index, len }.into());
        }
        Ok(crate::object::marks::marks_at(
            &state.marks,
            &state.seq,
            index,
        ))
    }

    /// Every visible mark run on the text at `path`.
    pub fn marks(&self, path: &Path) -> Result<Vec<Mark>> {
        let obj = self.resolve_text(path)?;
        let state = self.store.text(&obj)?;
        Ok(crate::object::marks::all_marks(&state.marks, &state.seq))
    }

    // ----- cursors ------------------------------------------------------

    /// An opaque token anchoring the `index`-th position of the sequence
    /// at `path`. `index == length` anchors the end.
    pub fn get_cursor(&self, path: &Path, index: usize, bias: Bias) -> Result<Vec<u8>> {
        let obj = self.resolve_seq(path)?;
        let seq = &self.store.seq(&obj)?.seq;
        let cursor = Cursor::at(obj, seq, index, bias).ok_or(DocError::InvalidIndex {
            index,
            len: seq.live_len(),
        })?;
        Ok(cursor.to_bytes())
    }

    /// The current live index of a cursor token.
    pub fn lookup_cursor(&self, token: &[u8]) -> Result<usize> {
        let cursor = Cursor::from_bytes(token)?;
        let state = match self.store.get(&cursor.obj) {
            Some(object) => object.seq().ok_or_else(|| DocError::InvalidPath {
                path: cursor.obj.to_string(),
                reason: "cursor object is not a sequence".to_string(),
            })?,
            None => return Err(DocError::UnknownCursor.into()),
        };
        cursor
            .resolve(&state.seq)
            .ok_or_else(|| DocError::UnknownCursor.into())
    }

    // ----- sync ---------------------------------------------------------

    /// Open a sync session for one peer; returns its handle.
    pub fn sync_init(&mut self) -> u64 {
        let id = self.next_session;
        self.next_session += 1;
        self.sessions.insert(id, SyncState::new());
        debug!(session = id, "opened sync session");
        id
    }

    /// Close a sync session.
    pub fn sync_free(&mut self, session: u64) -> Result<()> {
        self.sessions
            .remove(&session)
            .map(|_| ())
            .ok_or_else(|| SyncError::InvalidSession { id: session }.into())
    }

    /// Produce the next message for the peer, or `None` when there is
    /// nothing new to send given current knowledge.
    pub fn sync_generate(&mut self, session: u64) -> Result<Option<Vec<u8>>> {
        let mut state = self
            .sessions
            .remove(&session)
            .ok_or(SyncError::InvalidSession { id: session })?;
        let message = state.generate(&self.log);
        self.sessions.insert(session, state);
        Ok(message.map(|m| m.encode()))
    }

    /// Ingest a message from the peer.
    pub fn sync_receive(&mut self, session: u64, bytes: &[u8]) -> Result<()> {
        let mut state = self
            .sessions
            .remove(&session)
            .ok_or(SyncError::InvalidSession { id: session })?;
        let result = state.receive(&mut self.log, &mut self.store, &mut self.alloc, bytes);
        self.sessions.insert(session, state);
        result.map_err(Into::into)
    }

    // ----- internals ----------------------------------------------------

    /// Validate, wrap into a change, and apply one batch of local ops.
    fn commit(&mut self, ops: Vec<Op>) -> Result<Vec<ChangeHash>> {
        if ops.is_empty() {
            return Ok(self.get_heads());
        }
        self.store.check_ops(&ops)?;
        let actor = self.alloc.actor().clone();
        let seq = self.log.seq_of(&actor) + 1;
        let start_op = ops[0].id.counter;
        let change = Change::new(actor, seq, start_op, self.log.heads(), ops)?;
        self.store.apply_ops(change.ops())?;
        let heads = self.log.apply(change)?;
        Ok(heads)
    }

    /// Apply one remote change: dependency check, op validation, store
    /// mutation, log append, Lamport bump, in that order, so a rejected
    /// change leaves no trace.
    fn ingest(&mut self, change: Change) -> Result<()> {
        for dep in change.deps() {
            if !self.log.has(dep) {
                return Err(ChangeError::MissingDependency { missing: *dep }.into());
            }
        }
        self.store.check_ops(change.ops())?;
        self.store.apply_ops(change.ops())?;
        self.alloc.observe(change.max_op());
        self.log.apply(change)?;
        Ok(())
    }

    fn resolve(&self, path: &Path) -> Result<ObjId> {
        let mut obj = ObjId::Root;
        for segment in path.segments() {
            let value = match segment {
                Segment::Key(key) => {
                    self.store
                        .map_get(&obj, key)
                        .map_err(|e| self.path_error(path, e))?
                }
                Segment::Index(index) => self
                    .store
                    .seq_get(&obj, *index)
                    .map_err(|e| self.path_error(path, e))?,
            };
            obj = match value {
                Some(Value::Object(id, _)) => id,
                Some(Value::Scalar(_)) => {
                    return Err(DocError::InvalidPath {
                        path: path.to_string(),
                        reason: format!("segment {segment} resolves to a scalar"),
                    }
                    .into());
                }
                None => {
                    return Err(DocError::InvalidPath {
                        path: path.to_string(),
                        reason: format!("segment {segment} not found"),
                    }
                    .into());
                }
            };
        }
        Ok(obj)
    }

    fn resolve_seq(&self, path: &Path) -> Result<ObjId> {
        let obj = self.resolve(path)?;
        match self.store.get(&obj).map(|o| o.kind()) {
            Some(kind) if kind.is_sequence() => Ok(obj),
            Some(kind) => Err(DocError::InvalidPath {
                path: path.to_string(),
                reason: format!("expected a list or text object, found {}", kind.name()),
            }
            .into()),
            None => Err(DocError::InvalidPath {
                path: path.to_string(),
                reason: "object not found".to_string(),
            }
            .into()),
        }
    }

    fn resolve_text(&self, path: &Path) -> Result<ObjId> {
        let obj = self.resolve(path)?;
        match self.store.get(&obj).map(|o| o.kind()) {
            Some(ObjKind::Text) => Ok(obj),
            Some(kind) => Err(DocError::InvalidPath {
                path: path.to_string(),
                reason: format!("expected a text object, found {}", kind.name()),
            }
            .into()),
            None => Err(DocError::InvalidPath {
                path: path.to_string(),
                reason: "object not found".to_string(),
            }
            .into()),
        }
    }

    fn path_error(&self, path: &Path, err: ObjectError) -> crate::Error {
        DocError::InvalidPath {
            path: path.to_string(),
            reason: err.to_string(),
        }
        .into()
    }

    fn insert_anchor(&self, obj: &ObjId, index: usize) -> Result<ElemId> {
        let seq = &self.store.seq(obj)?.seq;
        let len = seq.live_len();
        if index > len {
            return Err(DocError::IndexOutOfBounds { index, len }.into());
        }
        Ok(if index == 0 {
            ElemId::Head
        } else {
            ElemId::Op(
                seq.live_get(index - 1)
                    .ok_or(DocError::IndexOutOfBounds { index, len })?
                    .id
                    .clone(),
            )
        })
    }

    fn apply_mark(
        &mut self,
        path: &Path,
        name: &str,
        value: ScalarValue,
        start: usize,
        end: usize,
        expand: Expand,
    ) -> Result<()> {
        let obj = self.resolve_text(path)?;
        let seq = &self.store.text(&obj)?.seq;
        let len = seq.live_len();
        if start >= end || end > len {
            return Err(DocError::InvalidRange { start, end, len }.into());
        }

        let start_anchor = if expand.expands_start() {
            if start == 0 {
                MarkAnchor::Start
            } else {
                MarkAnchor::Elem(self.live_elem_id(seq, start - 1)?)
            }
        } else {
            MarkAnchor::Elem(self.live_elem_id(seq, start)?)
        };
        let end_anchor = if expand.expands_end() {
            if end == len {
                MarkAnchor::End
            } else {
                MarkAnchor::Elem(self.live_elem_id(seq, end)?)
            }
        } else {
            MarkAnchor::Elem(self.live_elem_id(seq, end - 1)?)
        };

        let id = self.alloc.next(1);
        self.commit(vec![Op {
            id,
            obj,
            key: None,
            action: OpAction::Mark(MarkData {
                name: name.to_string(),
                value,
                start: start_anchor,
                end: end_anchor,
                expand,
            }),
            pred: vec![],
        }])?;
        Ok(())
    }

    fn live_elem_id(
        &self,
        seq: &crate::object::sequence::Sequence,
        index: usize,
    ) -> Result<OpId> {
        seq.live_get(index)
            .map(|e| e.id.clone())
            .ok_or_else(|| {
                DocError::InvalidIndex {
                    index,
                    len: seq.live_len(),
                }
                .into()
            })
    }

    fn object_json(&self, obj: &ObjId) -> serde_json::Value {
        let Some(object) = self.store.get(obj) else {
            return serde_json::Value::Null;
        };
        match object.kind() {
            ObjKind::Map => {
                let map = object.map().expect("map object has map state");
                let mut out = serde_json::Map::new();
                for key in map.keys() {
                    let value = map
                        .register(key)
                        .and_then(|reg| reg.winner())
                        .map(|win| match win {
                            crate::object::register::RegValue::Scalar(s) => s.to_json(),
                            crate::object::register::RegValue::Object(id, _) => {
                                self.object_json(&id)
                            }
                        })
                        .unwrap_or(serde_json::Value::Null);
                    out.insert(key.to_string(), value);
                }
                serde_json::Value::Object(out)
            }
            ObjKind::List => {
                let state = object.seq().expect("list object has sequence state");
                serde_json::Value::Array(
                    state
                        .seq
                        .live_iter()
                        .map(|e| match &e.value {
                            crate::object::sequence::ElemValue::Scalar(s) => s.to_json(),
                            crate::object::sequence::ElemValue::Object(id, _) => {
                                self.object_json(id)
                            }
                        })
                        .collect(),
                )
            }
            ObjKind::Text => {
                let state = object.seq().expect("text object has sequence state");
                serde_json::Value::String(state.seq.to_text())
            }
            ObjKind::Counter => {
                let counter = object.counter().expect("counter object has counter state");
                serde_json::Value::from(counter.value())
            }
        }
    }
}
