//! Probabilistic summary of a set of change hashes.
//!
//! Sync peers exchange a Bloom filter of the changes they hold since the
//! last shared state, so the other side can send only what is probably
//! missing. False positives are repaired by the explicit `need` list in
//! the next round; false negatives cannot occur.
//!
//! Change hashes are already uniformly random, so the probe positions are
//! derived from the hash bytes themselves (double hashing over the first
//! two 32-bit words) instead of hashing again.

use crate::change::ChangeHash;
use crate::codec::errors::CodecError;
use crate::codec::wire::{Decoder, Encoder};

/// Bits per entry; ten bits with seven probes keeps the false-positive
/// rate around 1%.
const BITS_PER_ENTRY: usize = 10;
const NUM_PROBES: usize = 7;

/// A Bloom filter over change hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bloom {
    entries: u64,
    bits: Vec<u8>,
}

impl Bloom {
    /// Build a filter containing exactly `hashes`.
    pub fn new(hashes: &[ChangeHash]) -> Self {
        let num_bits = (hashes.len() * BITS_PER_ENTRY).max(1);
        let mut bloom = Self {
            entries: hashes.len() as u64,
            bits: vec![0; num_bits.div_ceil(8)],
        };
        for hash in hashes {
            let probes: Vec<usize> = bloom.probes(hash).collect();
            for bit in probes {
                bloom.bits[bit / 8] |= 1 << (bit % 8);
            }
        }
        bloom
    }

    /// An empty filter (contains nothing).
    pub fn empty() -> Self {
        Self::new(&[])
    }

    /// Whether `hash` is probably in the set. `false` is definitive.
    pub fn contains(&self, hash: &ChangeHash) -> bool {
        if self.entries == 0 {
            return false;
        }
        self.probes(hash)
            .all(|bit| self.bits[bit / 8] & (1 << (bit % 8)) != 0)
    }

    fn probes(&self, hash: &ChangeHash) -> impl Iterator<Item = usize> + '_ {
        let bytes = hash.as_bytes();
        let h1 = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64;
        // Forced odd so the stride cycles every bit position.
        let h2 = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as u64 | 1;
        let num_bits = (self.bits.len() * 8) as u64;
        (0..NUM_PROBES as u64)
            .map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % num_bits) as usize)
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.uleb(self.entries);
        enc.bytes(&self.bits);
    }

    pub fn decode(dec: &mut Decoder<'_>) -> Result<Self, CodecError> {
        let entries = dec.uleb("bloom entries")?;
        let bits = dec.bytes("bloom bits")?.to_vec();
        if bits.is_empty() {
            return Err(CodecError::InvalidValue {
                context: "bloom bits",
                reason: "filter must contain at least one byte".to_string(),
            });
        }
        Ok(Self { entries, bits })
    }
}
