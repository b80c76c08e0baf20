//! Append-only change log.
//!
//! The log is the authoritative record a document can always be rebuilt
//! from. Changes are stored in application order (which is always a
//! topological order of the dependency DAG, because a change is only
//! accepted once all of its parents are present), indexed by hash, with
//! the current frontier (`heads`) maintained incrementally.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use super::{Change, ChangeError, ChangeHash};
use crate::ident::ActorId;

/// Append-only set of changes with their causal dependencies.
#[derive(Debug, Clone, Default)]
pub struct ChangeLog {
    changes: Vec<Change>,
    index: HashMap<ChangeHash, usize>,
    heads: BTreeSet<ChangeHash>,
    actor_seqs: HashMap<ActorId, u64>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of changes in the log.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Current frontier: the hashes with no successors, sorted.
    pub fn heads(&self) -> Vec<ChangeHash> {
        self.heads.iter().copied().collect()
    }

    pub fn has(&self, hash: &ChangeHash) -> bool {
        self.index.contains_key(hash)
    }

    pub fn get(&self, hash: &ChangeHash) -> Option<&Change> {
        self.index.get(hash).map(|&i| &self.changes[i])
    }

    /// All changes in application order.
    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    /// Highest change seq seen for an actor (0 if none).
    pub fn seq_of(&self, actor: &ActorId) -> u64 {
        self.actor_seqs.get(actor).copied().unwrap_or(0)
    }

    /// Validate and append a change, updating the heads.
    ///
    /// Applying a change already in the log is a no-op and returns the
    /// unchanged heads. Fails with [`ChangeError::MissingDependency`] if
    /// any declared parent is absent; the log is untouched in that case.
    pub fn apply(&mut self, change: Change) -> Result<Vec<ChangeHash>, ChangeError> {
        let hash = change.hash();
        if self.has(&hash) {
            debug!(change = %hash, "change already present, skipping");
            return Ok(self.heads());
        }
        for dep in change.deps() {
            if !self.has(dep) {
                return Err(ChangeError::MissingDependency { missing: *dep });
            }
        }

        for dep in change.deps() {
            self.heads.remove(dep);
        }
        self.heads.insert(hash);

        let seq = self.actor_seqs.entry(change.actor().clone()).or_insert(0);
        if change.seq() > *seq {
            *seq = change.seq();
        }

        debug!(
            change = %hash,
            actor = %change.actor(),
            ops = change.ops().len(),
            "appended change"
        );
        self.index.insert(hash, self.changes.len());
        self.changes.push(change);
        Ok(self.heads())
    }

    /// The minimal set of changes a replica holding exactly `have_heads`
    /// needs in order to reach this log's state, in application order.
    ///
    /// Fails with [`ChangeError::UnknownHead`] if a head is not in this
    /// log; the sync layer only passes verified heads, and the history
    /// façade surfaces the error.
    pub fn changes_since(&self, have_heads: &[ChangeHash]) -> Result<Vec<&Change>, ChangeError> {
        let covered = self.ancestors(have_heads)?;
        Ok(self
            .changes
            .iter()
            .filter(|c| !covered.contains(&c.hash()))
            .collect())
    }

    /// Every hash reachable from `heads` through dependency edges,
    /// including the heads themselves.
    pub fn ancestors(&self, heads: &[ChangeHash]) -> Result<HashSet<ChangeHash>, ChangeError> {
        let mut seen = HashSet::new();
        let mut stack = Vec::new();
        for head in heads {
            if !self.has(head) {
                return Err(ChangeError::UnknownHead { head: *head });
            }
            stack.push(*head);
        }
        while let Some(hash) = stack.pop() {
            if !seen.insert(hash) {
                continue;
            }
            if let Some(change) = self.get(&hash) {
                for dep in change.deps() {
                    if !seen.contains(dep) {
                        stack.push(*dep);
                    }
                }
            }
        }
        Ok(seen)
    }

    /// Drop heads the other side already covers: of `heads`, keep only
    /// those not an ancestor of (or equal to) a member of `covering`.
    /// Unknown hashes in either slice are ignored.
    pub fn advance_heads(
        &self,
        heads: &[ChangeHash],
        covering: &[ChangeHash],
    ) -> Vec<ChangeHash> {
        let known: Vec<ChangeHash> = covering.iter().filter(|h| self.has(h)).copied().collect();
        let covered = self.ancestors(&known).unwrap_or_default();
        let mut out: Vec<ChangeHash> = heads
            .iter()
            .filter(|h| self.has(h) && !covered.contains(h))
            .copied()
            .collect();
        out.extend(known.iter().copied());
        out.sort();
        out.dedup();
        out
    }
}
