//! Text splicing: boundaries, unicode positions, and merge behaviour of
//! concurrent runs.

use tandem::doc::Path;

use crate::helpers::{assert_same_state, doc_with_text};

#[test]
fn append_at_length() {
    let (mut doc, content) = doc_with_text(1, "ab");
    doc.splice_text(&content, 2, 0, "c").unwrap();
    assert_eq!(doc.get_text(&content).unwrap(), "abc");
}

#[test]
fn clear_everything() {
    let (mut doc, content) = doc_with_text(1, "gone soon");
    let len = doc.text_len(&content).unwrap();
    doc.splice_text(&content, 0, len, "").unwrap();
    assert_eq!(doc.get_text(&content).unwrap(), "");
    assert_eq!(doc.length(&content).unwrap(), 0);
}

#[test]
fn replace_in_the_middle() {
    let (mut doc, content) = doc_with_text(1, "one two three");
    doc.splice_text(&content, 4, 3, "2").unwrap();
    assert_eq!(doc.get_text(&content).unwrap(), "one 2 three");
}

#[test]
fn positions_count_characters_not_bytes() {
    let (mut doc, content) = doc_with_text(1, "héllo");
    assert_eq!(doc.text_len(&content).unwrap(), 5);
    doc.splice_text(&content, 2, 1, "L").unwrap();
    assert_eq!(doc.get_text(&content).unwrap(), "héLlo");
    doc.splice_text(&content, 5, 0, " wörld").unwrap();
    assert_eq!(doc.get_text(&content).unwrap(), "héLlo wörld");
}

#[test]
fn out_of_range_splices_are_rejected_without_effect() {
    let (mut doc, content) = doc_with_text(1, "abc");
    assert!(doc.splice_text(&content, 4, 0, "x").is_err());
    assert!(doc.splice_text(&content, 2, 5, "x").is_err());
    assert_eq!(doc.get_text(&content).unwrap(), "abc");
}

#[test]
fn splice_on_a_map_is_an_invalid_path() {
    let (mut doc, _) = doc_with_text(1, "abc");
    let err = doc.splice_text(&Path::root(), 0, 0, "x").unwrap_err();
    assert!(err.is_validation_error());
}

#[test]
fn concurrent_typing_runs_stay_contiguous() {
    let (mut a, content) = doc_with_text(1, "");
    let mut b = a.fork();

    for (i, c) in "abc".chars().enumerate() {
        a.splice_text(&content, i, 0, &c.to_string()).unwrap();
    }
    for (i, c) in "xyz".chars().enumerate() {
        b.splice_text(&content, i, 0, &c.to_string()).unwrap();
    }
    a.merge(&b).unwrap();
    b.merge(&a).unwrap();

    let text = a.get_text(&content).unwrap();
    assert_eq!(text, b.get_text(&content).unwrap());
    assert!(text == "abcxyz" || text == "xyzabc", "interleaved: {text}");
    assert_same_state(&a, &b);
}

#[test]
fn concurrent_deletes_of_same_char_merge_cleanly() {
    let (mut a, content) = doc_with_text(1, "abc");
    let mut b = a.fork();

    a.splice_text(&content, 1, 1, "").unwrap();
    b.splice_text(&content, 1, 1, "").unwrap();
    a.merge(&b).unwrap();
    b.merge(&a).unwrap();

    assert_eq!(a.get_text(&content).unwrap(), "ac");
    assert_same_state(&a, &b);
}

#[test]
fn delete_then_concurrent_insert_after_deleted_char() {
    let (mut a, content) = doc_with_text(1, "abc");
    let mut b = a.fork();

    // A deletes 'b'; B inserts after 'b' concurrently.
    a.splice_text(&content, 1, 1, "").unwrap();
    b.splice_text(&content, 2, 0, "X").unwrap();
    a.merge(&b).unwrap();
    b.merge(&a).unwrap();

    let text = a.get_text(&content).unwrap();
    assert_eq!(text, "aXc");
    assert_same_state(&a, &b);
}
