//! Property-based checks of the universal CRDT invariants: convergence,
//! commutativity, idempotence, round-trips, and counter additivity over
//! random edit scripts.

use proptest::prelude::*;

use tandem::doc::Path;
use tandem::Document;

use crate::helpers::{doc_with_actor, doc_with_text};

/// One random edit, interpreted against whatever state the document is
/// in when it runs (positions are taken modulo the current length).
#[derive(Debug, Clone)]
enum Edit {
    PutKey(u8, i64),
    DeleteKey(u8),
    Splice { pos: u8, del: u8, text: String },
    Increment(i8),
}

fn arb_edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0u8..4, any::<i64>()).prop_map(|(k, v)| Edit::PutKey(k, v)),
        (0u8..4).prop_map(Edit::DeleteKey),
        (any::<u8>(), 0u8..4, "[a-z]{0,6}").prop_map(|(pos, del, text)| Edit::Splice {
            pos,
            del,
            text
        }),
        any::<i8>().prop_map(Edit::Increment),
    ]
}

fn apply_edits(doc: &mut Document, content: &Path, edits: &[Edit]) {
    for edit in edits {
        match edit {
            Edit::PutKey(k, v) => {
                doc.put(&Path::root(), &format!("key{k}"), *v).unwrap();
            }
            Edit::DeleteKey(k) => {
                // Deleting an absent key is a validation error; skip it.
                let _ = doc.delete(&Path::root(), format!("key{k}"));
            }
            Edit::Splice { pos, del, text } => {
                let len = doc.text_len(content).unwrap();
                let pos = (*pos as usize) % (len + 1);
                let del = (*del as usize).min(len - pos);
                doc.splice_text(content, pos, del, text).unwrap();
            }
            Edit::Increment(delta) => {
                doc.increment(&Path::root(), "counter", *delta as i64).unwrap();
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Invariant 1: any two edit scripts merge to identical state.
    #[test]
    fn convergence_under_mutual_merge(
        edits_a in prop::collection::vec(arb_edit(), 0..10),
        edits_b in prop::collection::vec(arb_edit(), 0..10),
    ) {
        let (mut a, content) = doc_with_text(1, "seed text");
        let mut b = a.fork();
        apply_edits(&mut a, &content, &edits_a);
        apply_edits(&mut b, &content, &edits_b);

        a.merge(&b).unwrap();
        b.merge(&a).unwrap();

        prop_assert_eq!(a.get_heads(), b.get_heads());
        prop_assert_eq!(a.to_json(), b.to_json());
    }

    /// Invariant 2: applying two disjoint change sets in either order
    /// gives the same heads and state.
    #[test]
    fn merge_order_is_irrelevant(
        edits_a in prop::collection::vec(arb_edit(), 1..8),
        edits_b in prop::collection::vec(arb_edit(), 1..8),
    ) {
        let (base, content) = doc_with_text(1, "base");
        let mut a = base.fork();
        let mut b = base.fork();
        apply_edits(&mut a, &content, &edits_a);
        apply_edits(&mut b, &content, &edits_b);

        let mut xy = base.fork();
        xy.merge(&a).unwrap();
        xy.merge(&b).unwrap();
        let mut yx = base.fork();
        yx.merge(&b).unwrap();
        yx.merge(&a).unwrap();

        prop_assert_eq!(xy.get_heads(), yx.get_heads());
        prop_assert_eq!(xy.to_json(), yx.to_json());
    }

    /// Invariant 3: re-merging an already-merged document changes nothing.
    #[test]
    fn merge_is_idempotent(edits in prop::collection::vec(arb_edit(), 1..10)) {
        let (mut a, content) = doc_with_text(1, "idem");
        let mut b = a.fork();
        apply_edits(&mut a, &content, &edits);

        b.merge(&a).unwrap();
        let heads = b.get_heads();
        let json = b.to_json();
        b.merge(&a).unwrap();
        prop_assert_eq!(b.get_heads(), heads);
        prop_assert_eq!(b.to_json(), json);
    }

    /// Invariant 4: load(save(d)) preserves heads, state, and bytes.
    #[test]
    fn save_load_round_trip(edits in prop::collection::vec(arb_edit(), 0..12)) {
        let (mut doc, content) = doc_with_text(1, "persist");
        apply_edits(&mut doc, &content, &edits);

        let bytes = doc.save();
        let loaded = Document::load(&bytes).unwrap();
        prop_assert_eq!(loaded.get_heads(), doc.get_heads());
        prop_assert_eq!(loaded.to_json(), doc.to_json());
        prop_assert_eq!(loaded.save(), bytes);
    }

    /// Invariant 7: a counter's value is the sum of all deltas no matter
    /// how they are distributed across replicas.
    #[test]
    fn counter_additivity(
        deltas_a in prop::collection::vec(-100i64..100, 0..8),
        deltas_b in prop::collection::vec(-100i64..100, 0..8),
    ) {
        let mut a = doc_with_actor(1);
        let mut b = doc_with_actor(2);
        for d in &deltas_a {
            a.increment(&Path::root(), "n", *d).unwrap();
        }
        for d in &deltas_b {
            b.increment(&Path::root(), "n", *d).unwrap();
        }
        a.merge(&b).unwrap();
        b.merge(&a).unwrap();

        let expected: i64 = deltas_a.iter().sum::<i64>() + deltas_b.iter().sum::<i64>();
        if deltas_a.is_empty() && deltas_b.is_empty() {
            prop_assert!(a.get(&Path::root(), "n").unwrap().is_none());
        } else {
            prop_assert_eq!(a.counter_value(&Path::root(), "n").unwrap(), expected);
            prop_assert_eq!(b.counter_value(&Path::root(), "n").unwrap(), expected);
        }
    }

    /// Invariant 6: as long as no edit tombstones the anchored element,
    /// the cursor resolves to that element's current index.
    #[test]
    fn cursor_stability_under_edits(
        anchor in 0usize..8,
        edits in prop::collection::vec(
            (any::<u8>(), 0u8..3, any::<bool>(), "[a-z]{1,4}"),
            0..10,
        ),
    ) {
        let (mut doc, content) = doc_with_text(1, "anchored!");
        let target = "anchored!".chars().nth(anchor).unwrap();
        let cursor = doc
            .get_cursor(&content, anchor, tandem::cursor::Bias::Right)
            .unwrap();

        for (pos, del, before, text) in &edits {
            let idx = doc.lookup_cursor(&cursor).unwrap();
            let len = doc.text_len(&content).unwrap();
            if *del > 0 {
                // Delete a range strictly before or strictly after the
                // anchored character so it always survives.
                if *before && idx > 0 {
                    let start = (*pos as usize) % idx;
                    let del = (*del as usize).min(idx - start);
                    doc.splice_text(&content, start, del, "").unwrap();
                } else if idx + 1 < len {
                    let span = len - idx - 1;
                    let start = idx + 1 + (*pos as usize) % span;
                    let del = (*del as usize).min(len - start);
                    doc.splice_text(&content, start, del, "").unwrap();
                }
            } else {
                let at = (*pos as usize) % (len + 1);
                doc.splice_text(&content, at, 0, text).unwrap();
            }
        }

        // The anchored element is still live, so the cursor must land
        // exactly on it.
        let index = doc.lookup_cursor(&cursor).unwrap();
        let found = doc.get_text(&content).unwrap().chars().nth(index);
        prop_assert_eq!(found, Some(target));
    }
}
