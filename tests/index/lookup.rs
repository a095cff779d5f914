//! Lookups: term rows, dictionary, stored fields and reconstruction

use std::sync::Arc;

use crate::common::*;
use strata_core::CompositeSpec;
use strata_index::KeywordAnalyzer;

#[test]
fn test_document_reconstruction_from_stored_rows() {
    let (_store, index) = open_memory();
    index.update(person("1", "Ada Lovelace", 36.0)).unwrap();

    let doc = index.document("1").unwrap().unwrap();
    assert_eq!(doc.id(), b"1");
    assert_eq!(doc.field("name").unwrap().text_value(), Some("Ada Lovelace"));
    assert_eq!(doc.field("age").unwrap().numeric_value(), Some(36.0));
    assert_eq!(doc.field("unixEpoch").unwrap().datetime_value(), Some(epoch()));
}

#[test]
fn test_standard_analysis_lowercases_and_counts() {
    let (_store, index) = open_memory();
    index
        .update(Document::new("1").with_field(Field::text("body", "The cat saw the Cat")))
        .unwrap();

    let row = index.term_in_doc("body", b"cat", "1").unwrap().unwrap();
    assert_eq!(row.freq, 2);
    assert!((row.norm - 1.0 / 5f32.sqrt()).abs() < 1e-6);
    assert!(index.term_in_doc("body", b"Cat", "1").unwrap().is_none());
}

#[test]
fn test_term_vectors_record_positions_and_offsets() {
    let (_store, index) = open_memory();
    let options = IndexingOptions::INDEX_AND_STORE.with_term_vectors();
    index
        .update(Document::new("1").with_field(Field::text("body", "to be or not to be").with_options(options)))
        .unwrap();

    let row = index.term_in_doc("body", b"be", "1").unwrap().unwrap();
    let body = index.field_index("body").unwrap();
    let spans: Vec<(u16, u64, u64, u64)> = row
        .vectors
        .iter()
        .map(|v| (v.field, v.position, v.start, v.end))
        .collect();
    assert_eq!(spans, vec![(body, 2, 3, 5), (body, 6, 16, 18)]);
}

#[test]
fn test_composite_field_aggregates_and_is_not_stored() {
    let (_store, index) = open_memory();
    let spec = CompositeSpec {
        include: None,
        exclude: vec!["secret".to_string()],
    };
    let doc = Document::new("1")
        .with_field(Field::text("title", "Rust"))
        .with_field(Field::text("body", "rust everywhere"))
        .with_field(Field::text("secret", "hidden"))
        .with_field(Field::composite_with("_all", spec));
    index.update(doc).unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();

    assert_eq!(
        index.term_in_doc("_all", b"rust", "1").unwrap().unwrap().freq,
        2
    );
    assert!(index.term_in_doc("_all", b"hidden", "1").unwrap().is_none());
    assert_eq!(index.dictionary_count("_all", b"everywhere").unwrap(), 1);

    let restored = index.document("1").unwrap().unwrap();
    assert!(restored.field("_all").is_none());
    assert_eq!(restored.len(), 3);
}

#[test]
fn test_custom_analyzer() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let index =
        Index::open_with_analyzer(store, fast_config(), Arc::new(KeywordAnalyzer)).unwrap();
    index
        .update(Document::new("1").with_field(Field::text("tag", "New York")))
        .unwrap();
    assert!(index.term_in_doc("tag", b"New York", "1").unwrap().is_some());
    assert!(index.term_in_doc("tag", b"new", "1").unwrap().is_none());
}

#[test]
fn test_field_dict_lists_terms_in_order() {
    let (_store, index) = open_memory();
    index
        .update(Document::new("1").with_field(Field::text("color", "red green")))
        .unwrap();
    index
        .update(Document::new("2").with_field(Field::text("color", "green blue")))
        .unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();

    let dict: Vec<(Vec<u8>, u64)> = index
        .field_dict("color")
        .unwrap()
        .collect::<strata_core::Result<_>>()
        .unwrap();
    assert_eq!(
        dict,
        vec![
            (b"blue".to_vec(), 1),
            (b"green".to_vec(), 2),
            (b"red".to_vec(), 1)
        ]
    );
}

#[test]
fn test_unindexed_field_is_stored_only() {
    let (_store, index) = open_memory();
    let doc = Document::new("1")
        .with_field(Field::text("note", "remember me").with_options(IndexingOptions::STORE));
    index.update(doc).unwrap();

    assert!(index.term_in_doc("note", b"remember", "1").unwrap().is_none());
    let restored = index.document("1").unwrap().unwrap();
    assert_eq!(restored.field("note").unwrap().text_value(), Some("remember me"));
}

#[test]
fn test_stats_track_mutations() {
    let (_store, index) = open_memory();
    index.update(person("1", "a", 1.0)).unwrap();
    index.update(person("2", "b", 2.0)).unwrap();
    index.delete("1").unwrap();
    let mut batch = Batch::new();
    batch.update(person("3", "c", 3.0)).delete("2");
    index.batch(batch).unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();

    let stats = index.stats();
    assert_eq!(stats.doc_count, 1);
    assert_eq!(stats.fields, 4);
    assert_eq!(stats.updates, 3);
    assert_eq!(stats.deletes, 2);
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.errors, 0);
    assert!(stats.rows_written > 0);
    assert!(stats.rows_deleted > 0);
    assert!(stats.dictionary.flushes > 0);
    assert_eq!(stats.dictionary.pending, 0);
    assert_eq!(stats.dictionary.underflows, 0);
}
