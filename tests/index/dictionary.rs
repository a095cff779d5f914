//! Dictionary reference counts
//!
//! Counts converge to the number of term rows per (field, term) once the
//! updater drains, whatever order the mutations ran in.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::*;

#[test]
fn test_shared_numeric_terms_count_both_documents() {
    let (_store, index) = open_memory();
    index.update(person("1", "test", 35.99)).unwrap();
    index.update(person("2", "test2", 35.99)).unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();

    let age: Vec<(Vec<u8>, u64)> = index
        .field_dict("age")
        .unwrap()
        .collect::<strata_core::Result<_>>()
        .unwrap();
    assert_eq!(age.len(), 16);
    assert!(age.iter().all(|(_, count)| *count == 2));
    assert_eq!(index.dictionary_count("name", b"test").unwrap(), 1);
    assert_eq!(index.dictionary_count("name", b"test2").unwrap(), 1);
}

#[test]
fn test_id_terms_are_not_counted() {
    let (_store, index) = open_memory();
    index.update(person("1", "test", 1.0)).unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();
    assert_eq!(index.field_dict("_id").unwrap().count(), 0);
}

#[test]
fn test_counts_converge_after_random_mutations() {
    let (_store, index) = open_memory();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let words = ["alpha", "beta", "gamma", "delta", "epsilon"];

    for _ in 0..300 {
        let id = format!("doc-{}", rng.gen_range(0..20));
        if rng.gen_bool(0.2) {
            index.delete(&id).unwrap();
        } else {
            let text = (0..rng.gen_range(0..4usize))
                .map(|_| words[rng.gen_range(0..words.len())])
                .collect::<Vec<_>>()
                .join(" ");
            let doc = Document::new(id.as_str())
                .with_field(Field::text("body", text))
                .with_field(Field::numeric("score", f64::from(rng.gen_range(0..5u32))));
            index.update(doc).unwrap();
        }
    }
    index.drain_dictionary(DICT_WAIT).unwrap();

    assert_dictionary_consistent(&index);
    assert_eq!(index.stats().dictionary.underflows, 0);
}

#[test]
fn test_drain_returns_immediately_when_idle() {
    let (_store, index) = open_memory();
    index.drain_dictionary(std::time::Duration::from_millis(1)).unwrap();
}

#[test]
fn test_flush_failures_are_retried() {
    let (store, index) = open_faulty();
    index.update(person("1", "test", 35.99)).unwrap();
    index.drain_dictionary(DICT_WAIT).unwrap();

    index.update(person("2", "test2", 35.99)).unwrap();
    // Flushes issued while the store is down fail and are requeued
    store.fail_commits(true);
    std::thread::sleep(std::time::Duration::from_millis(30));
    store.fail_commits(false);
    index.drain_dictionary(DICT_WAIT).unwrap();

    assert_eq!(index.dictionary_count("name", b"test2").unwrap(), 1);
    assert_eq!(index.stats().dictionary.pending, 0);
    assert_dictionary_consistent(&index);
}
