//!
//! Two-peer delta synchronisation.
//!
//! A [`SyncState`] is the ephemeral per-peer half of a sync conversation.
//! Each round, `generate` summarises what this replica holds (its heads
//! plus a Bloom filter of everything since the last shared state) and
//! attaches any changes the peer is known to be missing; `receive`
//! ingests the peer's summary and changes. Changes whose parents have
//! not arrived yet are buffered inside the session and drained as soon
//! as the parents land; the missing parents are requested explicitly in
//! the next outgoing message, which also repairs Bloom false positives.
//!
//! Repeated `(generate, receive)` exchanges converge: once both sides
//! hold the same heads and have announced them, `generate` returns
//! nothing on both sides.

pub mod bloom;
pub mod errors;

pub use errors::SyncError;

use std::collections::HashSet;

use tracing::debug;

use crate::change::{Change, ChangeHash, ChangeLog};
use crate::codec::message::{SyncHave, SyncMessage};
use crate::ident::OpIdAllocator;
use crate::object::ObjectStore;

use bloom::Bloom;

/// Per-peer sync session state.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    /// The peer's last announced heads.
    their_heads: Option<Vec<ChangeHash>>,
    /// Changes the peer explicitly asked for.
    their_need: Vec<ChangeHash>,
    /// The peer's last "what I hold" summaries.
    their_have: Option<Vec<SyncHave>>,
    /// Heads both sides are known to share.
    shared_heads: Vec<ChangeHash>,
    /// Hashes already sent in this session.
    sent_hashes: HashSet<ChangeHash>,
    /// Our heads as of the last message we produced.
    last_sent_heads: Option<Vec<ChangeHash>>,
    /// Received changes waiting for their dependencies.
    buffered: Vec<Change>,
    /// Dependencies the buffered changes are waiting for.
    our_need: Vec<ChangeHash>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Heads both peers are known to have.
    pub fn shared_heads(&self) -> &[ChangeHash] {
        &self.shared_heads
    }

    /// Produce the next message for the peer, or `None` when both sides
    /// are known to be in sync and our heads have already been announced.
    pub fn generate(&mut self, log: &ChangeLog) -> Option<SyncMessage> {
        let our_heads = log.heads();

        let mut changes: Vec<Change> = Vec::new();
        if let Some(haves) = &self.their_have {
            let known_shared: Vec<ChangeHash> = haves
                .iter()
                .flat_map(|h| h.last_sync.iter())
                .filter(|h| log.has(h))
                .copied()
                .collect();
            if let Ok(candidates) = log.changes_since(&known_shared) {
                for change in candidates {
                    let hash = change.hash();
                    let peer_has_it = haves.iter().any(|h| h.bloom.contains(&hash));
                    let requested = self.their_need.contains(&hash);
                    if requested || (!peer_has_it && !self.sent_hashes.contains(&hash)) {
                        changes.push(change.clone());
                    }
                }
            }
        }
        // Explicit requests are honoured even for changes outside the
        // candidate walk (e.g. after the peer reset its session).
        for hash in &self.their_need {
            if !changes.iter().any(|c| &c.hash() == hash) {
                if let Some(change) = log.get(hash) {
                    changes.push(change.clone());
                }
            }
        }

        let in_sync = self.their_heads.as_deref() == Some(our_heads.as_slice());
        let announced = self.last_sent_heads.as_deref() == Some(our_heads.as_slice());
        if in_sync && announced && changes.is_empty() && self.our_need.is_empty() {
            return None;
        }

        for change in &changes {
            self.sent_hashes.insert(change.hash());
        }
        self.their_need.clear();
        self.last_sent_heads = Some(our_heads.clone());

        let since_shared: Vec<ChangeHash> = log
            .changes_since(&self.shared_heads)
            .map(|cs| cs.iter().map(|c| c.hash()).collect())
            .unwrap_or_default();
        debug!(
            heads = our_heads.len(),
            sending = changes.len(),
            need = self.our_need.len(),
            "generated sync message"
        );
        Some(SyncMessage {
            heads: our_heads,
            need: self.our_need.clone(),
            have: vec![SyncHave {
                last_sync: self.shared_heads.clone(),
                bloom: Bloom::new(&since_shared),
            }],
            changes,
        })
    }

    /// Ingest a message from the peer, applying its changes through the
    /// log and object store.
    ///
    /// A malformed message fails with [`SyncError::Protocol`] before any
    /// state (session or document) is touched. A zero-length message is
    /// a valid no-op. Changes with missing dependencies are buffered in
    /// the session until a later round supplies them.
    pub fn receive(
        &mut self,
        log: &mut ChangeLog,
        store: &mut ObjectStore,
        alloc: &mut OpIdAllocator,
        bytes: &[u8],
    ) -> Result<(), SyncError> {
        if bytes.is_empty() {
            return Ok(());
        }
        let msg = SyncMessage::decode(bytes)?;

        // Stage everything on copies so a rejected change leaves the
        // document and the session exactly as they were.
        let mut new_log = log.clone();
        let mut new_store = store.clone();
        let mut pending: Vec<Change> = self.buffered.clone();
        pending.extend(msg.changes.iter().cloned());

        let mut max_seen = 0u64;
        let mut progress = true;
        while progress {
            progress = false;
            let mut rest = Vec::with_capacity(pending.len());
            for change in pending {
                if new_log.has(&change.hash()) {
                    progress = true;
                    continue;
                }
                if change.deps().iter().all(|d| new_log.has(d)) {
                    new_store
                        .check_ops(change.ops())
                        .map_err(|e| SyncError::ChangeRejected {
                            reason: e.to_string(),
                        })?;
                    new_store
                        .apply_ops(change.ops())
                        .map_err(|e| SyncError::ChangeRejected {
                            reason: e.to_string(),
                        })?;
                    max_seen = max_seen.max(change.max_op());
                    new_log
                        .apply(change)
                        .map_err(|e| SyncError::ChangeRejected {
                            reason: e.to_string(),
                        })?;
                    progress = true;
                } else {
                    rest.push(change);
                }
            }
            pending = rest;
        }

        // Commit point: nothing below can fail.
        let mut missing: Vec<ChangeHash> = pending
            .iter()
            .flat_map(|c| c.deps().iter())
            .filter(|d| !new_log.has(d))
            .copied()
            .collect();
        missing.sort();
        missing.dedup();

        let known_their_heads: Vec<ChangeHash> = msg
            .heads
            .iter()
            .filter(|h| new_log.has(h))
            .copied()
            .collect();
        self.shared_heads = new_log.advance_heads(&self.shared_heads, &known_their_heads);
        debug!(
            applied = new_log.len() - log.len(),
            buffered = pending.len(),
            "received sync message"
        );

        *log = new_log;
        *store = new_store;
        alloc.observe(max_seen);
        self.buffered = pending;
        self.our_need = missing;
        self.their_heads = Some(msg.heads);
        self.their_need = msg.need;
        self.their_have = Some(msg.have);
        Ok(())
    }
}
