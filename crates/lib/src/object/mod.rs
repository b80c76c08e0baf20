//!
//! The materialised object tree.
//!
//! [`ObjectStore`] is the view of the change log as a tree of typed
//! objects: maps of multi-value registers, ordered sequences for lists
//! and text, and additive counters. It is updated incrementally as
//! changes are applied and can always be rebuilt from the log alone;
//! two replicas holding the same changes materialise byte-identical
//! state.
//!
//! Application is check-then-apply: every operation in a change is
//! validated against the store (and against objects the same change
//! creates) before the first mutation happens, so a rejected change
//! leaves no partial state behind.

pub mod errors;
pub mod marks;
pub mod register;
pub mod sequence;
pub mod value;

pub use errors::ObjectError;
pub use value::ScalarValue;

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::change::{Op, OpAction, OpKey};
use crate::ident::{ElemId, ObjId, OpId};

use marks::{MarkAnchor, MarkRecord};
use register::{RegValue, Register};
use sequence::{ElemValue, Sequence};

/// The closed set of object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ObjKind {
    Map,
    List,
    Text,
    Counter,
}

impl ObjKind {
    pub fn name(self) -> &'static str {
        match self {
            ObjKind::Map => "map",
            ObjKind::List => "list",
            ObjKind::Text => "text",
            ObjKind::Counter => "counter",
        }
    }

    pub fn is_sequence(self) -> bool {
        matches!(self, ObjKind::List | ObjKind::Text)
    }
}

/// A value as seen by readers: a scalar, or a reference to a child
/// object.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(ScalarValue),
    Object(ObjId, ObjKind),
}

impl Value {
    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::Object(..) => None,
        }
    }

    pub fn as_object(&self) -> Option<(&ObjId, ObjKind)> {
        match self {
            Value::Scalar(_) => None,
            Value::Object(id, kind) => Some((id, *kind)),
        }
    }

    fn from_reg(value: RegValue) -> Self {
        match value {
            RegValue::Scalar(s) => Value::Scalar(s),
            RegValue::Object(id, kind) => Value::Object(id, kind),
        }
    }

    fn from_elem(value: &ElemValue) -> Self {
        match value {
            ElemValue::Scalar(s) => Value::Scalar(s.clone()),
            ElemValue::Object(id, kind) => Value::Object(id.clone(), *kind),
        }
    }
}

/// Map state: string keys to registers, tombstoned keys retained.
#[derive(Debug, Clone, Default)]
pub struct MapState {
    entries: BTreeMap<String, Register>,
}

impl MapState {
    /// Live keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, reg)| !reg.is_empty())
            .map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.values().filter(|r| !r.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn register(&self, key: &str) -> Option<&Register> {
        self.entries.get(key)
    }

    fn register_mut(&mut self, key: &str) -> &mut Register {
        self.entries.entry(key.to_string()).or_default()
    }
}

/// Sequence state shared by lists and text; the mark list stays empty
/// for lists.
#[derive(Debug, Clone, Default)]
pub struct SeqState {
    pub seq: Sequence,
    pub marks: Vec<MarkRecord>,
}

/// Counter object state: the running sum and the ops that contributed.
#[derive(Debug, Clone, Default)]
pub struct CounterState {
    sum: i64,
    ops: Vec<OpId>,
}

impl CounterState {
    pub fn value(&self) -> i64 {
        self.sum
    }
}

#[derive(Debug, Clone)]
enum ObjState {
    Map(MapState),
    Seq(SeqState),
    Counter(CounterState),
}

/// One object in the tree.
#[derive(Debug, Clone)]
pub struct Object {
    kind: ObjKind,
    state: ObjState,
}

impl Object {
    fn new(kind: ObjKind) -> Self {
        let state = match kind {
            ObjKind::Map => ObjState::Map(MapState::default()),
            ObjKind::List | ObjKind::Text => ObjState::Seq(SeqState::default()),
            ObjKind::Counter => ObjState::Counter(CounterState::default()),
        };
        Self { kind, state }
    }

    pub fn kind(&self) -> ObjKind {
        self.kind
    }

    pub fn map(&self) -> Option<&MapState> {
        match &self.state {
            ObjState::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn seq(&self) -> Option<&SeqState> {
        match &self.state {
            ObjState::Seq(s) => Some(s),
            _ => None,
        }
    }

    pub fn counter(&self) -> Option<&CounterState> {
        match &self.state {
            ObjState::Counter(c) => Some(c),
            _ => None,
        }
    }
}

/// The typed tree of all objects in a document.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    objects: HashMap<ObjId, Object>,
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore {
    /// An empty store: just the root map.
    pub fn new() -> Self {
        let mut objects = HashMap::new();
        objects.insert(ObjId::Root, Object::new(ObjKind::Map));
        Self { objects }
    }

    pub fn get(&self, obj: &ObjId) -> Option<&Object> {
        self.objects.get(obj)
    }

    /// Look up an object, failing with `InvalidTarget` if absent.
    pub fn object(&self, obj: &ObjId) -> Result<&Object, ObjectError> {
        self.objects.get(obj).ok_or_else(|| ObjectError::InvalidTarget {
            obj: obj.to_string(),
        })
    }

    /// An object known to be a map.
    pub fn map(&self, obj: &ObjId) -> Result<&MapState, ObjectError> {
        let object = self.object(obj)?;
        object.map().ok_or_else(|| ObjectError::TypeMismatch {
            obj: obj.to_string(),
            expected: "map",
            actual: object.kind().name(),
        })
    }

    /// An object known to be a list or text sequence.
    pub fn seq(&self, obj: &ObjId) -> Result<&SeqState, ObjectError> {
        let object = self.object(obj)?;
        object.seq().ok_or_else(|| ObjectError::TypeMismatch {
            obj: obj.to_string(),
            expected: "list or text",
            actual: object.kind().name(),
        })
    }

    /// An object known to be a text sequence.
    pub fn text(&self, obj: &ObjId) -> Result<&SeqState, ObjectError> {
        let object = self.object(obj)?;
        if object.kind() != ObjKind::Text {
            return Err(ObjectError::TypeMismatch {
                obj: obj.to_string(),
                expected: "text",
                actual: object.kind().name(),
            });
        }
        Ok(object.seq().expect("text object has sequence state"))
    }

    /// Live length, per object kind: element count for sequences, key
    /// count for maps. `length` has no meaning on a counter.
    pub fn length(&self, obj: &ObjId) -> Result<usize, ObjectError> {
        let object = self.object(obj)?;
        match &object.state {
            ObjState::Map(m) => Ok(m.len()),
            ObjState::Seq(s) => Ok(s.seq.live_len()),
            ObjState::Counter(_) => Err(ObjectError::TypeMismatch {
                obj: obj.to_string(),
                expected: "map, list or text",
                actual: "counter",
            }),
        }
    }

    /// Validate a batch of operations without mutating anything.
    ///
    /// Objects created and elements inserted earlier in the same batch
    /// count as present for later operations.
    pub fn check_ops(&self, ops: &[Op]) -> Result<(), ObjectError> {
        let mut created: HashMap<ObjId, ObjKind> = HashMap::new();
        let mut inserted: HashSet<(ObjId, OpId)> = HashSet::new();

        for op in ops {
            let kind = match self.objects.get(&op.obj) {
                Some(object) => object.kind(),
                None => *created.get(&op.obj).ok_or_else(|| ObjectError::InvalidTarget {
                    obj: op.obj.to_string(),
                })?,
            };

            let elem_present = |elem: &ElemId, inserted: &HashSet<(ObjId, OpId)>| match elem {
                ElemId::Head => true,
                ElemId::Op(id) => {
                    inserted.contains(&(op.obj.clone(), id.clone()))
                        || self
                            .objects
                            .get(&op.obj)
                            .and_then(|o| o.seq())
                            .is_some_and(|s| s.seq.contains(id))
                }
            };
            let require_elem = |elem: &ElemId, inserted: &HashSet<(ObjId, OpId)>| {
                if elem_present(elem, inserted) {
                    Ok(())
                } else {
                    Err(ObjectError::ElementNotFound {
                        obj: op.obj.to_string(),
                        elem: elem
                            .as_op()
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| "_head".to_string()),
                    })
                }
            };
            let expect_kind = |expected: &'static str, ok: bool| {
                if ok {
                    Ok(())
                } else {
                    Err(ObjectError::TypeMismatch {
                        obj: op.obj.to_string(),
                        expected,
                        actual: kind.name(),
                    })
                }
            };

            match (&op.action, &op.key) {
                (OpAction::MakeObject(child), Some(OpKey::Map(_))) => {
                    expect_kind("map", kind == ObjKind::Map)?;
                    created.insert(ObjId::Op(op.id.clone()), *child);
                }
                (OpAction::MakeObject(child), Some(OpKey::Elem(elem))) => {
                    expect_kind("list", kind == ObjKind::List)?;
                    require_elem(elem, &inserted)?;
                    created.insert(ObjId::Op(op.id.clone()), *child);
                    inserted.insert((op.obj.clone(), op.id.clone()));
                }
                (OpAction::Set(_), Some(OpKey::Map(_))) => {
                    expect_kind("map", kind == ObjKind::Map)?;
                }
                (OpAction::Insert(_), Some(OpKey::Elem(elem))) => {
                    expect_kind("list or text", kind.is_sequence())?;
                    require_elem(elem, &inserted)?;
                    inserted.insert((op.obj.clone(), op.id.clone()));
                }
                (OpAction::Delete, Some(OpKey::Map(_))) => {
                    expect_kind("map", kind == ObjKind::Map)?;
                }
                (OpAction::Delete, Some(OpKey::Elem(ElemId::Op(id)))) => {
                    expect_kind("list or text", kind.is_sequence())?;
                    require_elem(&ElemId::Op(id.clone()), &inserted)?;
                }
                (OpAction::Increment(_), Some(OpKey::Map(_))) => {
                    expect_kind("map", kind == ObjKind::Map)?;
                }
                (OpAction::Increment(_), None) => {
                    expect_kind("counter", kind == ObjKind::Counter)?;
                }
                (OpAction::Mark(mark), None) => {
                    expect_kind("text", kind == ObjKind::Text)?;
                    for anchor in [&mark.start, &mark.end] {
                        if let MarkAnchor::Elem(id) = anchor {
                            require_elem(&ElemId::Op(id.clone()), &inserted)?;
                        }
                    }
                }
                (action, key) => {
                    return Err(ObjectError::InvalidOperation {
                        reason: format!(
                            "{} with key {:?} on {} object",
                            action.kind(),
                            key,
                            kind.name()
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Apply a batch of already-checked operations.
    ///
    /// Callers must run [`Self::check_ops`] first; after a successful
    /// check, application cannot fail, so any error here is reported as
    /// corruption.
    pub fn apply_ops(&mut self, ops: &[Op]) -> Result<(), ObjectError> {
        for op in ops {
            self.apply_op(op)?;
        }
        Ok(())
    }

    fn apply_op(&mut self, op: &Op) -> Result<(), ObjectError> {
        debug!(op = %op.id, action = op.action.kind(), obj = %op.obj, "applying op");
        match (&op.action, &op.key) {
            (OpAction::MakeObject(child), Some(key)) => {
                let child_id = ObjId::Op(op.id.clone());
                self.objects.insert(child_id.clone(), Object::new(*child));
                match key {
                    OpKey::Map(k) => self.reg_write(
                        &op.obj,
                        k,
                        op.id.clone(),
                        Some(RegValue::Object(child_id, *child)),
                        &op.pred,
                    ),
                    OpKey::Elem(after) => self.seq_insert(
                        &op.obj,
                        op.id.clone(),
                        after,
                        ElemValue::Object(child_id, *child),
                    ),
                }
            }
            (OpAction::Set(value), Some(OpKey::Map(k))) => self.reg_write(
                &op.obj,
                k,
                op.id.clone(),
                Some(RegValue::Scalar(value.clone())),
                &op.pred,
            ),
            (OpAction::Insert(value), Some(OpKey::Elem(after))) => self.seq_insert(
                &op.obj,
                op.id.clone(),
                after,
                ElemValue::Scalar(value.clone()),
            ),
            (OpAction::Delete, Some(OpKey::Map(k))) => {
                self.reg_write(&op.obj, k, op.id.clone(), None, &op.pred)
            }
            (OpAction::Delete, Some(OpKey::Elem(ElemId::Op(elem)))) => {
                let state = self.seq_state_mut(&op.obj)?;
                state.seq.tombstone(elem).ok_or_else(|| ObjectError::Corrupt {
                    reason: format!("checked delete of missing element {elem}"),
                })?;
                Ok(())
            }
            (OpAction::Increment(delta), Some(OpKey::Map(k))) => {
                let map = self.map_state_mut(&op.obj)?;
                map.register_mut(k).increment(op.id.clone(), *delta);
                Ok(())
            }
            (OpAction::Increment(delta), None) => {
                let counter = self.counter_state_mut(&op.obj)?;
                counter.sum = counter.sum.wrapping_add(*delta);
                counter.ops.push(op.id.clone());
                Ok(())
            }
            (OpAction::Mark(mark), None) => {
                let state = self.seq_state_mut(&op.obj)?;
                state.marks.push(MarkRecord {
                    id: op.id.clone(),
                    data: mark.clone(),
                });
                Ok(())
            }
            (action, key) => Err(ObjectError::Corrupt {
                reason: format!("unchecked op shape: {} with key {key:?}", action.kind()),
            }),
        }
    }

    fn reg_write(
        &mut self,
        obj: &ObjId,
        key: &str,
        id: OpId,
        value: Option<RegValue>,
        pred: &[OpId],
    ) -> Result<(), ObjectError> {
        let map = self.map_state_mut(obj)?;
        map.register_mut(key).write(id, value, pred);
        Ok(())
    }

    fn seq_insert(
        &mut self,
        obj: &ObjId,
        id: OpId,
        after: &ElemId,
        value: ElemValue,
    ) -> Result<(), ObjectError> {
        let obj_name = obj.to_string();
        let state = self.seq_state_mut(obj)?;
        state
            .seq
            .insert(id, after, value)
            .ok_or_else(|| ObjectError::Corrupt {
                reason: format!("checked insert after missing element in {obj_name}"),
            })?;
        Ok(())
    }

    fn map_state_mut(&mut self, obj: &ObjId) -> Result<&mut MapState, ObjectError> {
        match self.objects.get_mut(obj).map(|o| &mut o.state) {
            Some(ObjState::Map(m)) => Ok(m),
            _ => Err(ObjectError::Corrupt {
                reason: format!("checked map op on non-map {obj}"),
            }),
        }
    }

    fn seq_state_mut(&mut self, obj: &ObjId) -> Result<&mut SeqState, ObjectError> {
        match self.objects.get_mut(obj).map(|o| &mut o.state) {
            Some(ObjState::Seq(s)) => Ok(s),
            _ => Err(ObjectError::Corrupt {
                reason: format!("checked sequence op on non-sequence {obj}"),
            }),
        }
    }

    fn counter_state_mut(&mut self, obj: &ObjId) -> Result<&mut CounterState, ObjectError> {
        match self.objects.get_mut(obj).map(|o| &mut o.state) {
            Some(ObjState::Counter(c)) => Ok(c),
            _ => Err(ObjectError::Corrupt {
                reason: format!("checked counter op on non-counter {obj}"),
            }),
        }
    }

    /// Single-value read of a map key.
    pub fn map_get(&self, obj: &ObjId, key: &str) -> Result<Option<Value>, ObjectError> {
        Ok(self
            .map(obj)?
            .register(key)
            .and_then(|reg| reg.winner())
            .map(Value::from_reg))
    }

    /// Conflict-set read of a map key.
    pub fn map_get_all(&self, obj: &ObjId, key: &str) -> Result<Vec<Value>, ObjectError> {
        Ok(self
            .map(obj)?
            .register(key)
            .map(|reg| reg.all().into_iter().map(Value::from_reg).collect())
            .unwrap_or_default())
    }

    /// OpIds of the live writes to a map key (the `pred` for a new write).
    pub fn map_live_ids(&self, obj: &ObjId, key: &str) -> Result<Vec<OpId>, ObjectError> {
        Ok(self
            .map(obj)?
            .register(key)
            .map(|reg| reg.live_ids())
            .unwrap_or_default())
    }

    /// Read the `index`-th live element of a sequence.
    pub fn seq_get(&self, obj: &ObjId, index: usize) -> Result<Option<Value>, ObjectError> {
        Ok(self
            .seq(obj)?
            .seq
            .live_get(index)
            .map(|e| Value::from_elem(&e.value)))
    }
}
