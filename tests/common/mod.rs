//! Shared test utilities for the integration test suites.
//!
//! Import via `mod common;` from any test's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::collections::BTreeMap;
use std::sync::{Arc, Once};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
pub use strata_core::{
    DictionaryConfig, Document, Field, FieldKind, IndexConfig, IndexError, IndexingOptions,
};
pub use strata_index::{Batch, Index, Row, RowIter, RowKind};
pub use strata_storage::testing::FaultyStore;
pub use strata_storage::{KvStore, MemoryStore};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output through the test harness (visible with --nocapture)
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing_subscriber::filter::LevelFilter::WARN)
            .try_init();
    });
}

/// How long tests wait for the dictionary updater
pub const DICT_WAIT: Duration = Duration::from_secs(5);

/// Config with a short flush interval so tests do not sit on the timer
pub fn fast_config() -> IndexConfig {
    IndexConfig {
        dictionary: DictionaryConfig {
            flush_interval_ms: 5,
            ..DictionaryConfig::default()
        },
        ..IndexConfig::default()
    }
}

// ============================================================================
// Index helpers
// ============================================================================

/// A fresh index over its own in-memory store
pub fn open_memory() -> (Arc<MemoryStore>, Index) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let index = Index::open(store.clone(), fast_config()).expect("open index");
    (store, index)
}

/// A fresh index over a fault-injecting store
pub fn open_faulty() -> (Arc<FaultyStore<MemoryStore>>, Index) {
    init_tracing();
    let store = Arc::new(FaultyStore::new(MemoryStore::new()));
    let index = Index::open(store.clone(), fast_config()).expect("open index");
    (store, index)
}

/// Unix epoch as a UTC timestamp
pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).unwrap()
}

/// Document with a text, a numeric and a datetime field
pub fn person(id: &str, name: &str, age: f64) -> Document {
    Document::new(id)
        .with_field(Field::text("name", name))
        .with_field(Field::numeric("age", age))
        .with_field(Field::datetime("unixEpoch", epoch()).unwrap())
}

/// Rows of a person document at the default precision step:
/// id term + text term + 16 numeric terms + 16 datetime terms + 3 stored
pub const PERSON_ROWS: usize = 1 + 1 + 16 + 16 + 3;

/// Collect a dump, failing the test on any error
pub fn collect(rows: RowIter) -> Vec<Row> {
    rows.collect::<strata_core::Result<Vec<_>>>()
        .expect("dump rows")
}

/// Count rows of one kind
pub fn count_kind(rows: &[Row], kind: RowKind) -> usize {
    rows.iter().filter(|r| r.kind() == kind).count()
}

/// Every dictionary count equals the number of term rows for its key
pub fn assert_dictionary_consistent(index: &Index) {
    let mut expected: BTreeMap<(u16, Vec<u8>), u64> = BTreeMap::new();
    let mut actual: BTreeMap<(u16, Vec<u8>), u64> = BTreeMap::new();
    for row in collect(index.dump_all().expect("dump all")) {
        match row {
            Row::TermFrequency(t) if t.field != 0 => {
                *expected.entry((t.field, t.term)).or_default() += 1;
            }
            Row::Dictionary(d) => {
                actual.insert((d.field, d.term), d.count);
            }
            _ => {}
        }
    }
    assert_eq!(actual, expected, "dictionary rows disagree with term rows");
}
