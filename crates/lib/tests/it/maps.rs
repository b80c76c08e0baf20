//! Map and list operations through the façade.

use tandem::doc::{DocError, Path};
use tandem::object::{ObjKind, ScalarValue, Value};
use tandem::Error;

use crate::helpers::doc_with_actor;

#[test]
fn keys_lists_only_live_entries() {
    let mut doc = doc_with_actor(1);
    doc.put(&Path::root(), "a", 1i64).unwrap();
    doc.put(&Path::root(), "b", 2i64).unwrap();
    doc.put(&Path::root(), "c", 3i64).unwrap();
    doc.delete(&Path::root(), "b").unwrap();

    assert_eq!(doc.keys(&Path::root()).unwrap(), vec!["a", "c"]);
    assert_eq!(doc.length(&Path::root()).unwrap(), 2);
    assert_eq!(doc.get(&Path::root(), "b").unwrap(), None);
}

#[test]
fn overwrite_keeps_single_value() {
    let mut doc = doc_with_actor(1);
    doc.put(&Path::root(), "k", "one").unwrap();
    doc.put(&Path::root(), "k", "two").unwrap();
    assert_eq!(
        doc.get(&Path::root(), "k").unwrap(),
        Some(Value::Scalar(ScalarValue::Str("two".to_string())))
    );
    assert_eq!(doc.get_all(&Path::root(), "k").unwrap().len(), 1);
}

#[test]
fn nested_maps_and_lists_resolve_by_path() {
    let mut doc = doc_with_actor(1);
    let users = doc.put_object(&Path::root(), "users", ObjKind::List).unwrap();
    let first = doc.insert_object(&users, 0, ObjKind::Map).unwrap();
    doc.put(&first, "name", "ada").unwrap();
    doc.put(&first, "age", 36i64).unwrap();

    let by_path: Path = "$.users[0].name".parse().unwrap();
    let parent: Path = "$.users[0]".parse().unwrap();
    assert_eq!(
        doc.get(&parent, "name").unwrap(),
        Some(Value::Scalar(ScalarValue::Str("ada".to_string())))
    );
    assert_eq!(by_path.to_string(), "$.users[0].name");
    assert_eq!(doc.to_json()["users"][0]["age"], 36);
}

#[test]
fn list_insert_and_delete_by_index() {
    let mut doc = doc_with_actor(1);
    let items = doc.put_object(&Path::root(), "items", ObjKind::List).unwrap();
    doc.insert(&items, 0, "a").unwrap();
    doc.insert(&items, 1, "c").unwrap();
    doc.insert(&items, 1, "b").unwrap();
    assert_eq!(doc.length(&items).unwrap(), 3);

    doc.delete(&items, 1).unwrap();
    let remaining = doc.list_items(&items).unwrap();
    assert_eq!(
        remaining,
        vec![
            Value::Scalar(ScalarValue::Str("a".to_string())),
            Value::Scalar(ScalarValue::Str("c".to_string())),
        ]
    );
}

#[test]
fn list_index_out_of_bounds() {
    let mut doc = doc_with_actor(1);
    let items = doc.put_object(&Path::root(), "items", ObjKind::List).unwrap();
    doc.insert(&items, 0, 1i64).unwrap();

    let err = doc.insert(&items, 5, 2i64).unwrap_err();
    assert!(matches!(
        err,
        Error::Doc(DocError::IndexOutOfBounds { index: 5, .. })
    ));
    let err = doc.delete(&items, 3).unwrap_err();
    assert!(matches!(
        err,
        Error::Doc(DocError::IndexOutOfBounds { index: 3, .. })
    ));
}

#[test]
fn length_is_per_kind() {
    let mut doc = doc_with_actor(1);
    doc.put(&Path::root(), "scalar", 1i64).unwrap();
    let text = doc.put_object(&Path::root(), "text", ObjKind::Text).unwrap();
    doc.splice_text(&text, 0, 0, "four").unwrap();
    doc.put_object(&Path::root(), "score", ObjKind::Counter).unwrap();

    // Root map length counts keys, text counts characters.
    assert_eq!(doc.length(&Path::root()).unwrap(), 3);
    assert_eq!(doc.length(&text).unwrap(), 4);

    // Counters have no length.
    let score: Path = "$.score".parse().unwrap();
    let err = doc.length(&score).unwrap_err();
    assert!(err.is_validation_error());
}

#[test]
fn scalar_types_survive_reads() {
    let mut doc = doc_with_actor(1);
    doc.put(&Path::root(), "b", true).unwrap();
    doc.put(&Path::root(), "i", -5i64).unwrap();
    doc.put(&Path::root(), "u", 7u64).unwrap();
    doc.put(&Path::root(), "f", 2.5f64).unwrap();
    doc.put(&Path::root(), "s", "txt").unwrap();
    doc.put(&Path::root(), "raw", vec![1u8, 2, 3]).unwrap();

    let get = |k: &str| doc.get(&Path::root(), k).unwrap().unwrap();
    assert_eq!(get("b"), Value::Scalar(ScalarValue::Bool(true)));
    assert_eq!(get("i"), Value::Scalar(ScalarValue::Int(-5)));
    assert_eq!(get("u"), Value::Scalar(ScalarValue::Uint(7)));
    assert_eq!(get("f"), Value::Scalar(ScalarValue::F64(2.5)));
    assert_eq!(get("s"), Value::Scalar(ScalarValue::Str("txt".to_string())));
    assert_eq!(get("raw"), Value::Scalar(ScalarValue::Bytes(vec![1, 2, 3])));
}
