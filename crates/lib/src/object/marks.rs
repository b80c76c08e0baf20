//! Formatting marks on text.
//!
//! A mark names a formatting attribute (bold, a comment, a link target)
//! over a range of a text object. Marks are anchored to element ids, not
//! indices, so they ride along with the characters as other replicas
//! edit. The expansion policy decides whether characters inserted exactly
//! at a boundary inherit the mark, and is encoded as anchor affinity:
//!
//! * expand at the start means the start anchor is the element *before*
//!   the range (or the start sentinel), so anything inserted after that
//!   anchor falls inside;
//! * expand at the end means the end anchor is the element *after* the
//!   range (or the end sentinel), so anything inserted before it falls
//!   inside;
//! * without expansion, anchors sit on the first and last marked elements
//!   themselves.
//!
//! Removing a mark writes a mark with a `Null` value: at read time a null
//! mark suppresses same-name marks with lower OpIds over its span, while
//! concurrently-written value marks all survive and are all reported.

use serde::{Deserialize, Serialize};

use crate::codec::errors::CodecError;
use crate::ident::OpId;

use super::sequence::Sequence;
use super::value::ScalarValue;

/// Whether characters inserted at a mark's boundary inherit the mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expand {
    /// Inserts at neither boundary inherit.
    None,
    /// Inserts at the start inherit.
    Before,
    /// Inserts at the end inherit.
    After,
    /// Inserts at both boundaries inherit.
    Both,
}

impl Expand {
    pub fn expands_start(self) -> bool {
        matches!(self, Expand::Before | Expand::Both)
    }

    pub fn expands_end(self) -> bool {
        matches!(self, Expand::After | Expand::Both)
    }

    pub(crate) fn as_byte(self) -> u8 {
        match self {
            Expand::None => 0,
            Expand::Before => 1,
            Expand::After => 2,
            Expand::Both => 3,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Result<Self, CodecError> {
        match byte {
            0 => Ok(Expand::None),
            1 => Ok(Expand::Before),
            2 => Ok(Expand::After),
            3 => Ok(Expand::Both),
            tag => Err(CodecError::UnknownTag {
                context: "mark expand",
                tag,
            }),
        }
    }
}

/// A boundary of a mark's span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MarkAnchor {
    /// Before the first element of the sequence.
    Start,
    /// After the last element of the sequence.
    End,
    /// A specific element.
    Elem(OpId),
}

/// The payload of a `Mark` operation.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkData {
    pub name: String,
    /// `Null` clears the name over the span instead of setting it.
    pub value: ScalarValue,
    pub start: MarkAnchor,
    pub end: MarkAnchor,
    pub expand: Expand,
}

/// A mark as stored on a text object.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkRecord {
    pub id: OpId,
    pub data: MarkData,
}

/// A mark resolved to live character indices, as returned to callers.
/// The span is `start..end` (end exclusive).
#[derive(Debug, Clone, PartialEq)]
pub struct Mark {
    pub name: String,
    pub value: ScalarValue,
    pub start: usize,
    pub end: usize,
}

impl MarkRecord {
    fn is_unmark(&self) -> bool {
        self.data.value.is_null()
    }

    /// Resolve this record's span against the current sequence, in live
    /// indices. Tombstoned anchors collapse toward the inside of the
    /// span, which is exactly the nearest-live-neighbour rule cursors
    /// follow.
    pub fn span(&self, seq: &Sequence) -> Option<(usize, usize)> {
        let len = seq.live_len();
        let start = match &self.data.start {
            MarkAnchor::Start => 0,
            MarkAnchor::End => len,
            MarkAnchor::Elem(id) => {
                let pos = seq.pos_of(id)?;
                if self.data.expand.expands_start() {
                    // Anchor sits before the range.
                    seq.live_count_before(pos + 1)
                } else {
                    seq.live_count_before(pos)
                }
            }
        };
        let end = match &self.data.end {
            MarkAnchor::Start => 0,
            MarkAnchor::End => len,
            MarkAnchor::Elem(id) => {
                let pos = seq.pos_of(id)?;
                if self.data.expand.expands_end() {
                    // Anchor sits after the range.
                    seq.live_count_before(pos)
                } else {
                    seq.live_count_before(pos + 1)
                }
            }
        };
        Some((start, end))
    }

    fn covers(&self, seq: &Sequence, index: usize) -> bool {
        match self.span(seq) {
            Some((start, end)) => start <= index && index < end,
            None => false,
        }
    }
}

/// The marks visible at one character index: every value mark covering
/// the index that no higher-OpId null mark of the same name covers too.
pub fn marks_at(records: &[MarkRecord], seq: &Sequence, index: usize) -> Vec<Mark> {
    let mut out = Vec::new();
    for record in records {
        if record.is_unmark() || !record.covers(seq, index) {
            continue;
        }
        let cleared = records.iter().any(|other| {
            other.is_unmark()
                && other.data.name == record.data.name
                && other.id > record.id
                && other.covers(seq, index)
        });
        if cleared {
            continue;
        }
        let (start, end) = match record.span(seq) {
            Some(span) => span,
            None => continue,
        };
        out.push(Mark {
            name: record.data.name.clone(),
            value: record.data.value.clone(),
            start,
            end,
        });
    }
    out
}

/// Every visible mark run on the object.
///
/// A record whose span is partly cleared by an unmark is reported as the
/// surviving sub-runs. Runs are emitted in record order, then by start.
pub fn all_marks(records: &[MarkRecord], seq: &Sequence) -> Vec<Mark> {
    let len = seq.live_len();
    let mut out = Vec::new();
    for record in records {
        if record.is_unmark() {
            continue;
        }
        let (span_start, span_end) = match record.span(seq) {
            Some(span) => span,
            None => continue,
        };
        let mut run_start: Option<usize> = None;
        for index in span_start..span_end.min(len) {
            let visible = !records.iter().any(|other| {
                other.is_unmark()
                    && other.data.name == record.data.name
                    && other.id > record.id
                    && other.covers(seq, index)
            });
            match (visible, run_start) {
                (true, None) => run_start = Some(index),
                (false, Some(start)) => {
                    out.push(Mark {
                        name: record.data.name.clone(),
                        value: record.data.value.clone(),
                        start,
                        end: index,
                    });
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            out.push(Mark {
                name: record.data.name.clone(),
                value: record.data.value.clone(),
                start,
                end: span_end.min(len),
            });
        }
    }
    out
}
