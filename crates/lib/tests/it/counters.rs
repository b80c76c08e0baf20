//! Counter semantics: additive increments on map cells and on counter
//! objects.

use tandem::doc::Path;
use tandem::object::{ObjKind, ScalarValue, Value};

use crate::helpers::{assert_same_state, doc_with_actor};

#[test]
fn increment_creates_the_counter_on_first_use() {
    let mut doc = doc_with_actor(1);
    doc.increment(&Path::root(), "hits", 2).unwrap();
    doc.increment(&Path::root(), "hits", 3).unwrap();
    assert_eq!(doc.counter_value(&Path::root(), "hits").unwrap(), 5);
    assert_eq!(
        doc.get(&Path::root(), "hits").unwrap(),
        Some(Value::Scalar(ScalarValue::Counter(5)))
    );
}

#[test]
fn negative_deltas_decrement() {
    let mut doc = doc_with_actor(1);
    doc.increment(&Path::root(), "hits", 10).unwrap();
    doc.increment(&Path::root(), "hits", -4).unwrap();
    assert_eq!(doc.counter_value(&Path::root(), "hits").unwrap(), 6);
}

#[test]
fn value_is_order_independent_across_merges() {
    let mut a = doc_with_actor(1);
    let mut b = doc_with_actor(2);
    let mut c = doc_with_actor(3);
    a.increment(&Path::root(), "n", 1).unwrap();
    b.increment(&Path::root(), "n", 10).unwrap();
    c.increment(&Path::root(), "n", 100).unwrap();

    // Merge in three different orders; every replica sums to 111.
    a.merge(&b).unwrap();
    a.merge(&c).unwrap();
    c.merge(&a).unwrap();
    b.merge(&c).unwrap();

    for doc in [&a, &b, &c] {
        assert_eq!(doc.counter_value(&Path::root(), "n").unwrap(), 111);
    }
    assert_same_state(&a, &b);
    assert_same_state(&b, &c);
}

#[test]
fn counter_object_accumulates() {
    let mut doc = doc_with_actor(1);
    doc.put_object(&Path::root(), "score", ObjKind::Counter).unwrap();
    doc.increment(&Path::root(), "score", 7).unwrap();
    doc.increment(&Path::root(), "score", 5).unwrap();
    assert_eq!(doc.counter_value(&Path::root(), "score").unwrap(), 12);
    assert_eq!(doc.to_json()["score"], 12);
}

#[test]
fn counter_scalar_base_plus_increments() {
    let mut doc = doc_with_actor(1);
    doc.put(&Path::root(), "votes", ScalarValue::Counter(100)).unwrap();
    doc.increment(&Path::root(), "votes", 1).unwrap();
    doc.increment(&Path::root(), "votes", 1).unwrap();
    assert_eq!(doc.counter_value(&Path::root(), "votes").unwrap(), 102);
}

#[test]
fn counter_value_on_non_counter_is_a_type_error() {
    let mut doc = doc_with_actor(1);
    doc.put(&Path::root(), "name", "x").unwrap();
    let err = doc.counter_value(&Path::root(), "name").unwrap_err();
    assert_eq!(err.module(), "object");

    let err = doc.counter_value(&Path::root(), "missing").unwrap_err();
    assert_eq!(err.module(), "doc");
}
