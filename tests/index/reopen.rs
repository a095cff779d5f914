//! Reopening an existing store and loading configuration from disk

use std::sync::Arc;

use crate::common::*;
use strata_core::CONFIG_FILE_NAME;

#[test]
fn test_reopen_restores_state() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let before = {
        let index = Index::open(store.clone(), fast_config()).unwrap();
        index.update(person("1", "test", 35.99)).unwrap();
        index.update(person("2", "test2", 35.99)).unwrap();
        index.delete("2").unwrap();
        index.update(Document::new("3").with_field(Field::text("extra", "late field"))).unwrap();
        index.close().unwrap();
        collect(index.dump_all().unwrap())
    };

    let index = Index::open(store.clone(), fast_config()).unwrap();
    assert_eq!(index.doc_count(), 2);
    assert_eq!(index.fields(), vec!["_id", "name", "age", "unixEpoch", "extra"]);
    assert!(index.contains("1"));
    assert!(!index.contains("2"));
    assert_eq!(collect(index.dump_all().unwrap()), before);

    // Updates after reopen diff against the restored rows
    index.update(person("1", "renamed", 35.99)).unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();
    assert_eq!(index.doc_count(), 2);
    assert_eq!(index.dictionary_count("name", b"test").unwrap(), 0);
    assert_eq!(index.dictionary_count("name", b"renamed").unwrap(), 1);
    assert_eq!(index.field_index("extra"), Some(4));
    assert_dictionary_consistent(&index);
}

#[test]
fn test_new_fields_after_reopen_get_next_index() {
    let store = Arc::new(MemoryStore::new());
    {
        let index = Index::open(store.clone(), fast_config()).unwrap();
        index.update(Document::new("1").with_field(Field::text("a", "x"))).unwrap();
    }
    let index = Index::open(store, fast_config()).unwrap();
    index.update(Document::new("2").with_field(Field::text("b", "y"))).unwrap();
    assert_eq!(index.field_index("a"), Some(1));
    assert_eq!(index.field_index("b"), Some(2));
    assert_eq!(collect(index.dump_fields().unwrap()).len(), 3);
}

#[test]
fn test_reopen_with_other_schema_version_fails() {
    let store = Arc::new(MemoryStore::new());
    store.set(&[0x00], &[0x7f]).unwrap();
    assert!(matches!(
        Index::open(store, fast_config()),
        Err(IndexError::IncompatibleVersion { found: 0x7f, .. })
    ));
}

#[test]
fn test_config_file_drives_precision() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        "precision_step = 8\nanalysis_workers = 2\n\n[dictionary]\nflush_interval_ms = 5\n",
    )
    .unwrap();

    let config = IndexConfig::from_file(&path).unwrap();
    assert_eq!(config.precision_step, 8);
    assert_eq!(config.dictionary.batch_threshold, DictionaryConfig::default().batch_threshold);

    let index = Index::open(Arc::new(MemoryStore::new()), config).unwrap();
    index.update(person("1", "test", 35.99)).unwrap();
    // id term + text term + 8 numeric + 8 datetime + 3 stored
    assert_eq!(collect(index.dump_doc("1").unwrap()).len(), 1 + 1 + 8 + 8 + 3);
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "precision_step = 0\n").unwrap();
    assert!(matches!(IndexConfig::from_file(&path), Err(IndexError::Config(_))));
}
