//!
//! Binary formats for documents, change bundles, and sync messages.
//!
//! A saved document is a self-describing byte string:
//!
//! ```text
//! [magic 85 6F 4A 83] [version 01] [chunk count]
//!   then per chunk: [tag] [body length] [crc32c of body] [body]
//! ```
//!
//! Chunks carry the actor table, the change list (in application order,
//! each change in its canonical column-grouped body), and the heads of
//! the dependency DAG. Decoding reconstructs an identical log, with the same
//! hashes and the same heads, or fails with a [`CodecError`] before any
//! state becomes observable. Unknown versions and unknown chunk tags fail
//! fast; every chunk body is checksummed.
//!
//! A change bundle is the same envelope holding exactly one change, fully
//! self-contained (its dependencies are raw hashes). Sync messages have
//! their own lighter envelope, defined in [`message`].

pub mod errors;
pub mod message;
pub mod wire;

pub use errors::CodecError;

use crate::change::{Change, ChangeError, ChangeHash, ChangeLog};
use crate::ident::ActorId;

use wire::{Decoder, Encoder};

/// Magic bytes at offset 0 of every document and change bundle.
pub const MAGIC: [u8; 4] = [0x85, 0x6F, 0x4A, 0x83];

/// The single supported format version.
pub const FORMAT_VERSION: u8 = 1;

const CHUNK_ACTORS: u8 = 0x01;
const CHUNK_CHANGES: u8 = 0x02;
const CHUNK_HEADS: u8 = 0x03;

/// Serialise a whole change log as a document.
pub fn encode_document(log: &ChangeLog) -> Vec<u8> {
    let mut actors: Vec<&ActorId> = log.iter().map(|c| c.actor()).collect();
    actors.sort();
    actors.dedup();

    let mut actors_body = Encoder::new();
    actors_body.uleb(actors.len() as u64);
    for actor in &actors {
        actors_body.bytes(actor.as_bytes());
    }

    let mut changes_body = Encoder::new();
    changes_body.uleb(log.len() as u64);
    for change in log.iter() {
        changes_body.bytes(&change.body_bytes());
    }

    let heads = log.heads();
    let mut heads_body = Encoder::new();
    heads_body.uleb(heads.len() as u64);
    for head in &heads {
        heads_body.hash(head.as_bytes());
    }

    let mut enc = Encoder::new();
    enc.raw(&MAGIC);
    enc.byte(FORMAT_VERSION);
    enc.uleb(3);
    write_chunk(&mut enc, CHUNK_ACTORS, actors_body.into_bytes());
    write_chunk(&mut enc, CHUNK_CHANGES, changes_body.into_bytes());
    write_chunk(&mut enc, CHUNK_HEADS, heads_body.into_bytes());
    enc.into_bytes()
}

/// Decode a document into a fresh change log.
///
/// The log is rebuilt change by change; hashes are recomputed from the
/// canonical bodies, dependencies must precede their dependents, and the
/// heads chunk must match the rebuilt frontier.
pub fn decode_document(bytes: &[u8]) -> Result<ChangeLog, CodecError> {
    let mut dec = Decoder::new(bytes);
    read_envelope(&mut dec)?;
    let chunk_count = dec.count("chunk count")?;

    let mut actors: Option<Vec<ActorId>> = None;
    let mut log: Option<ChangeLog> = None;
    let mut declared_heads: Option<Vec<ChangeHash>> = None;

    for _ in 0..chunk_count {
        let (tag, body) = read_chunk(&mut dec)?;
        let mut body_dec = Decoder::new(body);
        match tag {
            CHUNK_ACTORS => {
                let count = body_dec.count("actor table")?;
                let mut table = Vec::with_capacity(count);
                for _ in 0..count {
                    let raw = body_dec.bytes("actor")?;
                    table.push(ActorId::from_bytes(raw).map_err(|_| {
                        CodecError::InvalidValue {
                            context: "actor",
                            reason: "empty actor id".to_string(),
                        }
                    })?);
                }
                body_dec.finish()?;
                actors = Some(table);
            }
            CHUNK_CHANGES => {
                let count = body_dec.count("change list")?;
                let mut rebuilt = ChangeLog::new();
                for index in 0..count {
                    let body = body_dec.bytes("change body")?;
                    let change = Change::from_body(body)?;
                    rebuilt.apply(change).map_err(|err| match err {
                        ChangeError::MissingDependency { .. } => {
                            CodecError::DependencyOrder { index }
                        }
                        other => CodecError::InvalidValue {
                            context: "change list",
                            reason: other.to_string(),
                        },
                    })?;
                }
                body_dec.finish()?;
                log = Some(rebuilt);
            }
            CHUNK_HEADS => {
                let count = body_dec.count("heads")?;
                let mut heads = Vec::with_capacity(count);
                for _ in 0..count {
                    heads.push(ChangeHash(body_dec.hash("head")?));
                }
                body_dec.finish()?;
                declared_heads = Some(heads);
            }
            tag => {
                return Err(CodecError::UnknownTag {
                    context: "chunk tag",
                    tag,
                });
            }
        }
    }
    dec.finish()?;

    let log = log.ok_or(CodecError::InvalidValue {
        context: "document",
        reason: "missing change chunk".to_string(),
    })?;
    if actors.is_none() {
        return Err(CodecError::InvalidValue {
            context: "document",
            reason: "missing actor chunk".to_string(),
        });
    }
    if let Some(mut declared) = declared_heads {
        declared.sort();
        if declared != log.heads() {
            return Err(CodecError::InvalidValue {
                context: "heads",
                reason: "declared heads do not match the change DAG".to_string(),
            });
        }
    } else {
        return Err(CodecError::InvalidValue {
            context: "document",
            reason: "missing heads chunk".to_string(),
        });
    }
    Ok(log)
}

/// Serialise a single change as a self-contained bundle.
pub fn encode_change(change: &Change) -> Vec<u8> {
    let mut body = Encoder::new();
    body.uleb(1);
    body.bytes(&change.body_bytes());

    let mut enc = Encoder::new();
    enc.raw(&MAGIC);
    enc.byte(FORMAT_VERSION);
    enc.uleb(1);
    write_chunk(&mut enc, CHUNK_CHANGES, body.into_bytes());
    enc.into_bytes()
}

/// Decode a change bundle.
pub fn decode_change(bytes: &[u8]) -> Result<Change, CodecError> {
    let mut dec = Decoder::new(bytes);
    read_envelope(&mut dec)?;
    let chunk_count = dec.count("chunk count")?;
    if chunk_count != 1 {
        return Err(CodecError::InvalidValue {
            context: "change bundle",
            reason: format!("expected one chunk, found {chunk_count}"),
        });
    }
    let (tag, body) = read_chunk(&mut dec)?;
    if tag != CHUNK_CHANGES {
        return Err(CodecError::UnknownTag {
            context: "change bundle chunk",
            tag,
        });
    }
    dec.finish()?;

    let mut body_dec = Decoder::new(body);
    let count = body_dec.count("change list")?;
    if count != 1 {
        return Err(CodecError::InvalidValue {
            context: "change bundle",
            reason: format!("expected one change, found {count}"),
        });
    }
    let change_body = body_dec.bytes("change body")?;
    let change = Change::from_body(change_body)?;
    body_dec.finish()?;
    Ok(change)
}

fn read_envelope(dec: &mut Decoder<'_>) -> Result<(), CodecError> {
    let magic = dec.raw(4, "magic bytes")?;
    if magic != MAGIC {
        let mut got = [0u8; 4];
        got.copy_from_slice(magic);
        return Err(CodecError::BadMagic { got });
    }
    let version = dec.byte("format version")?;
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion {
            got: version,
            supported: FORMAT_VERSION,
        });
    }
    Ok(())
}

fn write_chunk(enc: &mut Encoder, tag: u8, body: Vec<u8>) {
    enc.byte(tag);
    enc.uleb(body.len() as u64);
    enc.u32_le(crc32c::crc32c(&body));
    enc.raw(&body);
}

fn read_chunk<'a>(dec: &mut Decoder<'a>) -> Result<(u8, &'a [u8]), CodecError> {
    let tag = dec.byte("chunk tag")?;
    let len = dec.uleb("chunk length")? as usize;
    let expected = dec.u32_le("chunk checksum")?;
    let body = dec.raw(len, "chunk body")?;
    let got = crc32c::crc32c(body);
    if got != expected {
        return Err(CodecError::ChecksumMismatch { expected, got });
    }
    Ok((tag, body))
}
