//! Concurrent writers
//!
//! Writers on disjoint ids never lose an update; writers racing on the same
//! id leave exactly one consistent version behind.

use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::*;

#[test]
fn test_disjoint_writers_lose_nothing() {
    let (_store, index) = open_memory();
    let index = Arc::new(index);
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let index = Arc::clone(&index);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(t as u64);
                let mut live = BTreeMap::new();
                barrier.wait();
                for _ in 0..100 {
                    let id = format!("t{}-{}", t, rng.gen_range(0..10));
                    if rng.gen_bool(0.25) {
                        index.delete(&id).unwrap();
                        live.remove(&id);
                    } else {
                        let name = format!("n{}", rng.gen_range(0..5));
                        let age = f64::from(rng.gen_range(0..3u32));
                        index.update(person(&id, &name, age)).unwrap();
                        live.insert(id, name);
                    }
                }
                live
            })
        })
        .collect();

    let mut expected = BTreeMap::new();
    for handle in handles {
        expected.extend(handle.join().unwrap());
    }

    assert_eq!(index.doc_count(), expected.len() as u64);
    for (id, name) in &expected {
        let doc = index.document(id).unwrap().unwrap();
        assert_eq!(doc.field("name").unwrap().text_value(), Some(name.as_str()));
        assert_eq!(collect(index.dump_doc(id).unwrap()).len(), PERSON_ROWS);
    }

    index.drain_dictionary(DICT_WAIT).unwrap();
    assert_dictionary_consistent(&index);
}

#[test]
fn test_racing_writers_on_one_id_converge() {
    let (_store, index) = open_memory();
    let index = Arc::new(index);
    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let index = Arc::clone(&index);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..50 {
                    let name = format!("writer{}x{}", t, i % 3);
                    index.update(person("shared", &name, t as f64)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(index.doc_count(), 1);
    assert_eq!(collect(index.dump_doc("shared").unwrap()).len(), PERSON_ROWS);

    index.drain_dictionary(DICT_WAIT).unwrap();
    let names: Vec<(Vec<u8>, u64)> = index
        .field_dict("name")
        .unwrap()
        .collect::<strata_core::Result<_>>()
        .unwrap();
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].1, 1);
    assert_dictionary_consistent(&index);
}

#[test]
fn test_readers_see_whole_documents() {
    let (_store, index) = open_memory();
    let index = Arc::new(index);
    index.update(person("doc", "start", 0.0)).unwrap();

    let writer = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for i in 0..200 {
                if i % 10 == 9 {
                    index.delete("doc").unwrap();
                } else {
                    index.update(person("doc", &format!("v{}", i), i as f64)).unwrap();
                }
            }
        })
    };

    for _ in 0..200 {
        let rows = collect(index.dump_doc("doc").unwrap());
        assert!(rows.is_empty() || rows.len() == PERSON_ROWS, "torn read: {} rows", rows.len());
    }
    writer.join().unwrap();
}

#[test]
fn test_batches_and_single_updates_interleave() {
    let (_store, index) = open_memory();
    let index = Arc::new(index);

    let batcher = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for round in 0..20 {
                let mut batch = Batch::new();
                batch
                    .update(person("a", &format!("a{}", round), 1.0))
                    .update(person("b", &format!("b{}", round), 2.0));
                index.batch(batch).unwrap();
            }
        })
    };
    let single = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for round in 0..20 {
                index.update(person("b", &format!("s{}", round), 3.0)).unwrap();
                index.update(person("c", &format!("c{}", round), 4.0)).unwrap();
            }
        })
    };
    batcher.join().unwrap();
    single.join().unwrap();

    assert_eq!(index.doc_count(), 3);
    index.drain_dictionary(DICT_WAIT).unwrap();
    assert_dictionary_consistent(&index);
}
