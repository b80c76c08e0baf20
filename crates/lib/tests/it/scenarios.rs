//! End-to-end scenarios:
//! two-peer text merge, concurrent edits, counter convergence, sync
//! round-trips, cursor stability, and codec round-trips.

use tandem::cursor::Bias;
use tandem::doc::Path;
use tandem::object::{ObjKind, ScalarValue, Value};
use tandem::Document;

use crate::helpers::{assert_same_state, doc_with_actor, doc_with_text, sync_until_quiet};

/// One peer types, the other applies the encoded changes.
#[test]
fn two_peer_text_merge() {
    let (mut a, content) = doc_with_text(1, "");
    a.splice_text(&content, 0, 0, "Hello").unwrap();

    let mut b = doc_with_actor(2);
    let bundles = a.get_changes(&[]).unwrap();
    b.apply_changes(bundles.iter().map(|b| b.as_slice())).unwrap();

    assert_eq!(a.get_text(&content).unwrap(), "Hello");
    assert_eq!(b.get_text(&content).unwrap(), "Hello");
    assert_same_state(&a, &b);
}

/// Concurrent non-overlapping edits merge to the same text with
/// both contributions intact.
#[test]
fn concurrent_non_overlapping_edits() {
    let (mut a, content) = doc_with_text(1, "Hello");
    let mut b = a.fork();
    b.set_actor([2u8; 16]).ok();

    a.splice_text(&content, 0, 0, "Hi ").unwrap();
    assert_eq!(a.get_text(&content).unwrap(), "Hi Hello");
    b.splice_text(&content, 5, 0, " World").unwrap();
    assert_eq!(b.get_text(&content).unwrap(), "Hello World");

    a.merge(&b).unwrap();
    b.merge(&a).unwrap();

    let text = a.get_text(&content).unwrap();
    assert_eq!(text, b.get_text(&content).unwrap());
    assert!(text.contains("Hi "));
    assert!(text.contains(" World"));
    assert_same_state(&a, &b);
}

/// Counters add across replicas that never shared history.
#[test]
fn counter_convergence() {
    let mut a = doc_with_actor(1);
    let mut b = doc_with_actor(2);
    a.increment(&Path::root(), "hits", 5).unwrap();
    b.increment(&Path::root(), "hits", 3).unwrap();

    a.merge(&b).unwrap();
    b.merge(&a).unwrap();

    assert_eq!(a.counter_value(&Path::root(), "hits").unwrap(), 8);
    assert_eq!(b.counter_value(&Path::root(), "hits").unwrap(), 8);
    assert_same_state(&a, &b);
}

/// A sync exchange drains in a bounded number of rounds and ends
/// with equal heads and empty messages on both sides.
#[test]
fn sync_round_trip_empties_need() {
    let (mut a, content) = doc_with_text(1, "");
    for i in 0..20 {
        a.splice_text(&content, 0, 0, &format!("edit {i}\n")).unwrap();
        a.put(&Path::root(), &format!("k{i}"), i as i64).unwrap();
    }
    let mut b = doc_with_actor(2);

    let rounds = sync_until_quiet(&mut a, &mut b);
    assert_eq!(a.get_heads(), b.get_heads());
    assert!(rounds <= 6, "took {rounds} rounds");
    assert_same_state(&a, &b);
}

/// A cursor keeps tracking its character through a prepend.
#[test]
fn cursor_survives_prepend() {
    let (mut doc, content) = doc_with_text(1, "Hello World");
    let cursor = doc.get_cursor(&content, 6, Bias::Right).unwrap();
    doc.splice_text(&content, 0, 0, "Hi ").unwrap();
    assert_eq!(doc.lookup_cursor(&cursor).unwrap(), 9);
}

/// A document with every object kind round-trips byte-equal.
#[test]
fn codec_round_trip_full_document() {
    let mut doc = doc_with_actor(1);
    doc.put(&Path::root(), "title", "draft").unwrap();
    doc.put(&Path::root(), "flag", true).unwrap();
    let content = doc
        .put_object(&Path::root(), "content", ObjKind::Text)
        .unwrap();
    doc.splice_text(&content, 0, 0, "Hello marks").unwrap();
    doc.mark(
        &content,
        "bold",
        true,
        0,
        5,
        tandem::object::marks::Expand::Both,
    )
    .unwrap();
    let items = doc.put_object(&Path::root(), "items", ObjKind::List).unwrap();
    doc.insert(&items, 0, "first").unwrap();
    doc.insert(&items, 1, 2i64).unwrap();
    doc.put_object(&Path::root(), "score", ObjKind::Counter).unwrap();
    doc.increment(&Path::root(), "score", 11).unwrap();

    let bytes = doc.save();
    let loaded = Document::load(&bytes).unwrap();
    assert_eq!(loaded.save(), bytes, "save is deterministic");
    assert_eq!(loaded.get_heads(), doc.get_heads());
    assert_eq!(loaded.get_text(&content).unwrap(), "Hello marks");
    assert_eq!(
        loaded.get(&Path::root(), "title").unwrap(),
        Some(Value::Scalar(ScalarValue::Str("draft".to_string())))
    );
    assert_eq!(loaded.counter_value(&Path::root(), "score").unwrap(), 11);
    let marks = loaded.marks(&content).unwrap();
    assert_eq!(marks.len(), 1);
    // Type fidelity: the boolean mark value is still a boolean.
    assert_eq!(marks[0].value, ScalarValue::Bool(true));
    assert_eq!(loaded.to_json(), doc.to_json());
}
