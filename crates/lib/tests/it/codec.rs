//! Document bytes: round-trips and rejection of malformed input.

use tandem::doc::Path;
use tandem::object::ObjKind;
use tandem::{Document, Error};

use crate::helpers::{assert_same_state, doc_with_actor, doc_with_text};

#[test]
fn empty_document_round_trips() {
    let doc = doc_with_actor(1);
    let bytes = doc.save();
    let loaded = Document::load(&bytes).unwrap();
    assert!(loaded.get_heads().is_empty());
    assert_eq!(loaded.save(), bytes);
}

#[test]
fn loaded_document_stays_editable() {
    let (mut a, content) = doc_with_text(1, "persisted");
    let mut loaded = Document::load(&a.save()).unwrap();
    loaded.splice_text(&content, 9, 0, " and grown").unwrap();
    assert_eq!(loaded.get_text(&content).unwrap(), "persisted and grown");

    // The original can merge the loaded copy's new edits.
    a.merge(&loaded).unwrap();
    assert_same_state(&a, &loaded);
}

#[test]
fn loaded_document_resumes_actor_counters_safely() {
    let (mut a, content) = doc_with_text(1, "abc");
    let mut loaded = Document::load(&a.save()).unwrap();

    // New local ops must dominate everything in the loaded history, or
    // concurrent edits would interleave wrongly.
    loaded.splice_text(&content, 3, 0, "d").unwrap();
    a.splice_text(&content, 3, 0, "X").unwrap();
    a.merge(&loaded).unwrap();
    loaded.merge(&a).unwrap();
    assert_same_state(&a, &loaded);
}

#[test]
fn magic_bytes_are_checked_first() {
    let doc = doc_with_actor(1);
    let mut bytes = doc.save();
    assert_eq!(bytes[..4], [0x85, 0x6F, 0x4A, 0x83]);
    bytes[1] = 0;
    let err = Document::load(&bytes).unwrap_err();
    assert!(err.is_codec_error());
}

#[test]
fn unsupported_version_fails_fast() {
    let doc = doc_with_actor(1);
    let mut bytes = doc.save();
    bytes[4] = 0xfe;
    let err = Document::load(&bytes).unwrap_err();
    assert!(err.is_codec_error());
}

#[test]
fn every_truncation_point_is_rejected() {
    let mut doc = doc_with_actor(1);
    doc.put(&Path::root(), "k", 1i64).unwrap();
    doc.put_object(&Path::root(), "t", ObjKind::Text).unwrap();
    let bytes = doc.save();
    for cut in 0..bytes.len() {
        assert!(
            Document::load(&bytes[..cut]).is_err(),
            "load accepted a prefix of {cut} bytes"
        );
    }
}

#[test]
fn bit_flips_in_chunk_bodies_are_caught() {
    let mut doc = doc_with_actor(1);
    for i in 0..5 {
        doc.put(&Path::root(), &format!("k{i}"), i as i64).unwrap();
    }
    let bytes = doc.save();
    // Flip a byte near the end (inside the last chunk body).
    let mut corrupt = bytes.clone();
    let target = corrupt.len() - 3;
    corrupt[target] ^= 0x10;
    assert!(Document::load(&corrupt).is_err());
}

#[test]
fn change_bundles_reject_document_envelopes() {
    let mut doc = doc_with_actor(1);
    doc.put(&Path::root(), "k", 1i64).unwrap();
    // A whole document is not a single-change bundle.
    let err = doc_with_actor(2).apply_change(&doc.save()).unwrap_err();
    assert!(matches!(err, Error::Codec(_)));
}

#[test]
fn save_load_save_is_byte_stable() {
    let (mut doc, content) = doc_with_text(1, "stability");
    doc.put(&Path::root(), "n", 4i64).unwrap();
    doc.splice_text(&content, 0, 0, "byte ").unwrap();

    let b1 = doc.save();
    let d2 = Document::load(&b1).unwrap();
    let b2 = d2.save();
    let d3 = Document::load(&b2).unwrap();
    assert_eq!(b1, b2);
    assert_eq!(d3.save(), b2);
    assert_same_state(&d2, &d3);
}
