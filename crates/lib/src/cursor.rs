//! Stable position tokens.
//!
//! A cursor anchors a logical position in a list or text object by
//! element id rather than by index, so it keeps pointing at the same
//! place while concurrent edits move the index around. The token is an
//! opaque byte string safe to hand to external callers and decode later,
//! even on a different replica that holds the same history.
//!
//! If the anchored element has been tombstoned by the time the cursor is
//! resolved, the cursor slides to the nearest live neighbour in the
//! direction of its bias.

use crate::codec::errors::CodecError;
use crate::codec::wire::{Decoder, Encoder};
use crate::ident::{ActorId, ObjId, OpId};
use crate::object::sequence::Sequence;

const CURSOR_VERSION: u8 = 1;

/// Which way a cursor slides off a tombstoned anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bias {
    /// Toward the previous live element.
    Left,
    /// Toward the next live element.
    #[default]
    Right,
}

/// What a cursor is anchored to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorAnchor {
    /// The position before the first element.
    Start,
    /// The position after the last element.
    End,
    /// A specific element.
    Elem(OpId),
}

/// A decoded cursor: the object it points into, the anchor, and the bias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub obj: ObjId,
    pub anchor: CursorAnchor,
    pub bias: Bias,
}

impl Cursor {
    /// Anchor the `index`-th live position of `seq` within object `obj`.
    ///
    /// `index == live_len` anchors the end sentinel. Returns `None` when
    /// `index` is past the end; the caller reports that as an
    /// invalid-index error.
    pub fn at(obj: ObjId, seq: &Sequence, index: usize, bias: Bias) -> Option<Self> {
        let len = seq.live_len();
        let anchor = if index == len {
            CursorAnchor::End
        } else if index > len {
            return None;
        } else {
            CursorAnchor::Elem(seq.live_get(index)?.id.clone())
        };
        Some(Self { obj, anchor, bias })
    }

    /// The current live index of the anchored position.
    ///
    /// Returns `None` when the anchored element is not in the sequence at
    /// all (an unknown cursor); the caller reports that as an error.
    pub fn resolve(&self, seq: &Sequence) -> Option<usize> {
        match &self.anchor {
            CursorAnchor::Start => Some(0),
            CursorAnchor::End => Some(seq.live_len()),
            CursorAnchor::Elem(id) => {
                let pos = seq.pos_of(id)?;
                let before = seq.live_count_before(pos);
                let elem = seq.element_at_pos(pos)?;
                if !elem.tombstone {
                    return Some(before);
                }
                match self.bias {
                    // First live element after the anchor has exactly
                    // `before` live elements in front of it.
                    Bias::Right => Some(before),
                    Bias::Left => Some(before.saturating_sub(1).min(seq.live_len())),
                }
            }
        }
    }

    /// Encode as an opaque token.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.byte(CURSOR_VERSION);
        match &self.obj {
            ObjId::Root => enc.byte(0),
            ObjId::Op(id) => {
                enc.byte(1);
                encode_opid(&mut enc, id);
            }
        }
        match &self.anchor {
            CursorAnchor::Start => enc.byte(0),
            CursorAnchor::End => enc.byte(1),
            CursorAnchor::Elem(id) => {
                enc.byte(2);
                encode_opid(&mut enc, id);
            }
        }
        enc.byte(match self.bias {
            Bias::Left => 0,
            Bias::Right => 1,
        });
        enc.into_bytes()
    }

    /// Decode a token produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut dec = Decoder::new(bytes);
        let version = dec.byte("cursor version")?;
        if version != CURSOR_VERSION {
            return Err(CodecError::UnsupportedVersion {
                got: version,
                supported: CURSOR_VERSION,
            });
        }
        let obj = match dec.byte("cursor object")? {
            0 => ObjId::Root,
            1 => ObjId::Op(decode_opid(&mut dec)?),
            tag => {
                return Err(CodecError::UnknownTag {
                    context: "cursor object",
                    tag,
                });
            }
        };
        let anchor = match dec.byte("cursor anchor")? {
            0 => CursorAnchor::Start,
            1 => CursorAnchor::End,
            2 => CursorAnchor::Elem(decode_opid(&mut dec)?),
            tag => {
                return Err(CodecError::UnknownTag {
                    context: "cursor anchor",
                    tag,
                });
            }
        };
        let bias = match dec.byte("cursor bias")? {
            0 => Bias::Left,
            1 => Bias::Right,
            tag => {
                return Err(CodecError::UnknownTag {
                    context: "cursor bias",
                    tag,
                });
            }
        };
        dec.finish()?;
        Ok(Self { obj, anchor, bias })
    }
}

fn encode_opid(enc: &mut Encoder, id: &OpId) {
    enc.uleb(id.counter);
    enc.bytes(id.actor.as_bytes());
}

fn decode_opid(dec: &mut Decoder<'_>) -> Result<OpId, CodecError> {
    let counter = dec.uleb("cursor opid counter")?;
    let raw = dec.bytes("cursor opid actor")?;
    let actor = ActorId::from_bytes(raw).map_err(|_| CodecError::InvalidValue {
        context: "cursor opid actor",
        reason: "empty actor id".to_string(),
    })?;
    Ok(OpId::new(counter, actor))
}
