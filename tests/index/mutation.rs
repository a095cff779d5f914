//! Update and delete semantics
//!
//! Covers the symmetric-difference rewrite, delete of live and unknown
//! documents, batches, and behavior when the store rejects reads or writes.

use crate::common::*;
use std::collections::BTreeMap;

use strata_index::rows::{stored_key, term_key};

#[test]
fn test_reindexing_same_document_writes_nothing() {
    let (store, index) = open_memory();
    index.update(person("1", "test", 35.99)).unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();
    let commits = store.commit_count();
    let rows = store.len();

    index.update(person("1", "test", 35.99)).unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();
    assert_eq!(store.commit_count(), commits);
    assert_eq!(store.len(), rows);
    assert_eq!(index.doc_count(), 1);
}

fn doc_rows(index: &Index, id: &str) -> BTreeMap<Vec<u8>, Vec<u8>> {
    collect(index.dump_doc(id).unwrap())
        .iter()
        .map(Row::to_pair)
        .collect()
}

#[test]
fn test_changed_text_replaces_only_its_term() {
    let (store, index) = open_memory();
    index.update(person("1", "before", 35.99)).unwrap();
    let old_rows = doc_rows(&index, "1");
    index.update(person("1", "after", 35.99)).unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();
    let new_rows = doc_rows(&index, "1");

    let name = index.field_index("name").unwrap();
    let before = term_key(name, b"before", b"1");
    let after = term_key(name, b"after", b"1");
    let stored_name = stored_key(b"1", name);

    // Every other row is byte-identical
    let unchanged = |rows: &BTreeMap<Vec<u8>, Vec<u8>>| -> BTreeMap<Vec<u8>, Vec<u8>> {
        rows.iter()
            .filter(|(k, _)| **k != before && **k != after && **k != stored_name)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    };
    assert_eq!(unchanged(&old_rows), unchanged(&new_rows));
    assert_eq!(unchanged(&new_rows).len(), PERSON_ROWS - 2);
    assert!(old_rows.contains_key(&before) && !new_rows.contains_key(&before));
    assert!(new_rows.contains_key(&after) && !old_rows.contains_key(&after));
    assert_ne!(old_rows[&stored_name], new_rows[&stored_name]);

    assert!(store.get(&term_key(name, b"before", b"1")).unwrap().is_none());
    assert!(store.get(&term_key(name, b"after", b"1")).unwrap().is_some());
    assert_eq!(collect(index.dump_doc("1").unwrap()).len(), PERSON_ROWS);

    assert_eq!(index.dictionary_count("name", b"before").unwrap(), 0);
    assert_eq!(index.dictionary_count("name", b"after").unwrap(), 1);
    assert_eq!(index.doc_count(), 1);
    assert_dictionary_consistent(&index);
}

#[test]
fn test_dropping_a_field_removes_its_rows() {
    let (_store, index) = open_memory();
    index.update(person("1", "test", 35.99)).unwrap();
    index
        .update(Document::new("1").with_field(Field::text("name", "test")))
        .unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();

    // id term, text term, one stored field
    assert_eq!(collect(index.dump_doc("1").unwrap()).len(), 3);
    assert_eq!(index.field_dict("age").unwrap().count(), 0);
    // Field rows are never removed
    assert_eq!(index.fields().len(), 4);
    assert_dictionary_consistent(&index);
}

#[test]
fn test_delete_removes_every_row() {
    let (_store, index) = open_memory();
    index.update(person("1", "test", 35.99)).unwrap();
    index.update(person("2", "test2", 35.99)).unwrap();
    index.delete("1").unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();

    assert_eq!(index.doc_count(), 1);
    assert!(!index.contains("1"));
    assert!(index.document("1").unwrap().is_none());
    assert!(collect(index.dump_doc("1").unwrap()).is_empty());
    assert_eq!(index.dictionary_count("name", b"test").unwrap(), 0);
    assert_dictionary_consistent(&index);

    index.delete("2").unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();
    let all = collect(index.dump_all().unwrap());
    assert_eq!(all.len(), 1 + 4);
    assert_eq!(count_kind(&all, RowKind::Dictionary), 0);
}

#[test]
fn test_delete_unknown_document_is_noop() {
    let (store, index) = open_memory();
    let commits = store.commit_count();
    index.delete("ghost").unwrap();
    assert_eq!(store.commit_count(), commits);
    assert_eq!(index.doc_count(), 0);
}

#[test]
fn test_delete_then_reindex() {
    let (_store, index) = open_memory();
    index.update(person("1", "test", 1.5)).unwrap();
    index.delete("1").unwrap();
    index.update(person("1", "test", 1.5)).unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();

    assert_eq!(index.doc_count(), 1);
    assert_eq!(index.dictionary_count("name", b"test").unwrap(), 1);
    assert_dictionary_consistent(&index);
}

#[test]
fn test_document_without_fields_is_live() {
    let (_store, index) = open_memory();
    index.update(Document::new("bare")).unwrap();
    assert_eq!(index.doc_count(), 1);
    assert!(index.contains("bare"));
    assert_eq!(collect(index.dump_doc("bare").unwrap()).len(), 1);
}

#[test]
fn test_binary_document_ids() {
    let (_store, index) = open_memory();
    let id: &[u8] = &[0x00, 0xff, 0x00, 0x01];
    index
        .update(Document::new(id).with_field(Field::text("t", "bytes")))
        .unwrap();
    index
        .update(Document::new(&id[..1]).with_field(Field::text("t", "prefix")))
        .unwrap();

    assert_eq!(index.doc_count(), 2);
    assert_eq!(collect(index.dump_doc(id).unwrap()).len(), 3);
    let doc = index.document(id).unwrap().unwrap();
    assert_eq!(doc.id(), id);
    assert_eq!(doc.field("t").unwrap().text_value(), Some("bytes"));

    index.delete(&id[..1]).unwrap();
    assert!(index.contains(id));
}

#[test]
fn test_invalid_document_changes_nothing() {
    let (store, index) = open_memory();
    let rows = store.len();
    let doc = Document::new("1").with_field(Field::text("_id", "spoof"));
    assert!(matches!(index.update(doc), Err(IndexError::InvalidInput(_))));
    assert_eq!(store.len(), rows);
    assert_eq!(index.stats().errors, 1);
}

// ============================================================================
// Batches
// ============================================================================

#[test]
fn test_batch_last_operation_wins() {
    let (_store, index) = open_memory();
    index.update(person("keep", "keep", 1.0)).unwrap();

    let mut batch = Batch::new();
    batch
        .update(person("a", "first", 1.0))
        .update(person("a", "second", 1.0))
        .update(person("b", "gone", 2.0))
        .delete("b")
        .delete("keep")
        .update(person("keep", "revived", 3.0));
    index.batch(batch).unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();

    assert_eq!(index.doc_count(), 2);
    assert!(!index.contains("b"));
    assert_eq!(index.dictionary_count("name", b"second").unwrap(), 1);
    assert_eq!(index.dictionary_count("name", b"first").unwrap(), 0);
    assert_eq!(index.dictionary_count("name", b"revived").unwrap(), 1);
    assert_eq!(index.dictionary_count("name", b"keep").unwrap(), 0);
    assert_dictionary_consistent(&index);
}

#[test]
fn test_empty_batch_is_noop() {
    let (store, index) = open_memory();
    let commits = store.commit_count();
    index.batch(Batch::new()).unwrap();
    assert_eq!(store.commit_count(), commits);
    assert_eq!(index.stats().batches, 0);
}

// ============================================================================
// Store failures
// ============================================================================

#[test]
fn test_write_failure_is_retryable_and_harmless() {
    let (store, index) = open_faulty();
    index.update(person("1", "test", 35.99)).unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();
    let before = collect(index.dump_all().unwrap());

    store.fail_commits(true);
    let err = index.update(person("1", "changed", 36.0)).unwrap_err();
    assert!(matches!(err, IndexError::StoreWrite(_)));
    assert!(err.is_retryable());
    assert!(matches!(index.delete("1"), Err(IndexError::StoreWrite(_))));
    store.fail_commits(false);

    assert_eq!(collect(index.dump_all().unwrap()), before);
    assert_eq!(index.doc_count(), 1);
    assert_eq!(index.stats().errors, 2);

    index.update(person("1", "changed", 36.0)).unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();
    assert_eq!(index.dictionary_count("name", b"changed").unwrap(), 1);
    assert_dictionary_consistent(&index);
}

#[test]
fn test_new_field_write_failure_assigns_nothing() {
    let (store, index) = open_faulty();
    store.fail_commits(true);
    let doc = Document::new("1").with_field(Field::text("fresh", "x"));
    assert!(matches!(index.update(doc), Err(IndexError::StoreWrite(_))));
    store.fail_commits(false);

    assert_eq!(index.field_index("fresh"), None);
    assert_eq!(index.fields(), vec!["_id"]);
    assert_eq!(index.doc_count(), 0);
}

#[test]
fn test_read_failure_surfaces_as_store_read() {
    let (store, index) = open_faulty();
    index.update(person("1", "test", 35.99)).unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();

    store.fail_reads(true);
    assert!(matches!(
        index.update(person("1", "other", 1.0)),
        Err(IndexError::StoreRead(_))
    ));
    assert!(index.dump_all().is_err());
    store.fail_reads(false);

    assert_eq!(index.dictionary_count("name", b"test").unwrap(), 1);
}

#[test]
fn test_closed_index_rejects_mutations_but_keeps_rows() {
    let (store, index) = open_memory();
    index.update(person("1", "test", 35.99)).unwrap();
    index.close().unwrap();

    assert!(matches!(
        index.update(person("2", "x", 1.0)),
        Err(IndexError::Closed)
    ));
    assert!(matches!(index.batch(Batch::new()), Err(IndexError::Closed)));
    assert!(index.is_closed());
    // The store belongs to the caller and stays usable
    assert!(store.len() > 0);
}
