//! Sync message envelope.
//!
//! `[version][heads][need][have][changes]`: heads and need are arrays of
//! 32-byte hashes, each have entry pairs the last known shared heads with
//! a Bloom filter of everything held since, and changes are canonical
//! change bodies. A zero-length message is valid and means "no knowledge
//! update, no data".

use crate::change::{Change, ChangeHash};
use crate::sync::bloom::Bloom;

use super::errors::CodecError;
use super::wire::{Decoder, Encoder};

/// The single supported sync protocol version.
pub const MESSAGE_VERSION: u8 = 1;

/// One "what I hold" summary: the shared heads the filter is relative to,
/// plus the filter itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncHave {
    pub last_sync: Vec<ChangeHash>,
    pub bloom: Bloom,
}

/// A decoded sync message.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncMessage {
    /// The sender's current heads.
    pub heads: Vec<ChangeHash>,
    /// Changes the sender wants sent explicitly (Bloom false positives).
    pub need: Vec<ChangeHash>,
    /// Summaries of what the sender already holds.
    pub have: Vec<SyncHave>,
    /// Changes the sender believes the receiver is missing.
    pub changes: Vec<Change>,
}

impl SyncMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.byte(MESSAGE_VERSION);
        encode_hashes(&mut enc, &self.heads);
        encode_hashes(&mut enc, &self.need);
        enc.uleb(self.have.len() as u64);
        for have in &self.have {
            encode_hashes(&mut enc, &have.last_sync);
            have.bloom.encode(&mut enc);
        }
        enc.uleb(self.changes.len() as u64);
        for change in &self.changes {
            enc.bytes(&change.body_bytes());
        }
        enc.into_bytes()
    }

    /// Decode a message, fully validating before returning: a malformed
    /// message yields an error and nothing else.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut dec = Decoder::new(bytes);
        let version = dec.byte("sync message version")?;
        if version != MESSAGE_VERSION {
            return Err(CodecError::UnsupportedVersion {
                got: version,
                supported: MESSAGE_VERSION,
            });
        }
        let heads = decode_hashes(&mut dec, "sync heads")?;
        let need = decode_hashes(&mut dec, "sync need")?;
        let have_count = dec.count("sync have")?;
        let mut have = Vec::with_capacity(have_count);
        for _ in 0..have_count {
            let last_sync = decode_hashes(&mut dec, "sync have heads")?;
            let bloom = Bloom::decode(&mut dec)?;
            have.push(SyncHave { last_sync, bloom });
        }
        let change_count = dec.count("sync changes")?;
        let mut changes = Vec::with_capacity(change_count);
        for _ in 0..change_count {
            let body = dec.bytes("sync change body")?;
            changes.push(Change::from_body(body)?);
        }
        dec.finish()?;
        Ok(Self {
            heads,
            need,
            have,
            changes,
        })
    }
}

fn encode_hashes(enc: &mut Encoder, hashes: &[ChangeHash]) {
    enc.uleb(hashes.len() as u64);
    for hash in hashes {
        enc.hash(hash.as_bytes());
    }
}

fn decode_hashes(
    dec: &mut Decoder<'_>,
    context: &'static str,
) -> Result<Vec<ChangeHash>, CodecError> {
    let count = dec.count(context)?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(ChangeHash(dec.hash(context)?));
    }
    Ok(out)
}
