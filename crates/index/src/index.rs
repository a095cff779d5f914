//! The index: mutation engine over a [`KvStore`]
//!
//! # Update path
//!
//! ```text
//! update(doc)
//!   -> analysis queue (worker pool)       analyze_document
//!   -> field cache                        intern names, persist Field rows
//!   -> builder                            complete new row set
//!   -> per-document lock
//!        old rows (directory + snapshot)  RowDelta::compute
//!        one atomic commit                removals + upserts
//!        directory / doc_count            only after the commit succeeded
//!   -> dictionary updater                 +1 / -1 per changed (field, term)
//! ```
//!
//! A failed commit leaves the store, the directory and `doc_count` exactly as
//! they were and returns `StoreWrite`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{RwLock, RwLockReadGuard};
use strata_core::{Document, IndexConfig, IndexError, Result, ID_FIELD};
use strata_storage::{KvSnapshot, KvStore, WriteBatch};
use tracing::{debug, info, warn};

use crate::analysis::{AnalyzedDocument, Analyzer, StandardAnalyzer};
use crate::analysis_queue::AnalysisQueue;
use crate::batch::Batch;
use crate::builder::{build_rows, DocRows};
use crate::delta::DocumentPlan;
use crate::dictionary::{DictionaryKey, DictionaryUpdater};
use crate::directory::RowDirectory;
use crate::doc_locks::DocLocks;
use crate::field_cache::FieldCache;
use crate::rows::{decode_term_key, stored_doc_prefix, Row, SCHEMA_VERSION, VERSION_KEY};
use crate::stats::{IndexCounters, IndexStats};

/// Document-to-row index over an ordered key-value store
pub struct Index {
    pub(crate) store: Arc<dyn KvStore>,
    config: IndexConfig,
    pub(crate) fields: FieldCache,
    pub(crate) directory: RowDirectory,
    pub(crate) locks: DocLocks,
    analysis: AnalysisQueue,
    dictionary: DictionaryUpdater,
    doc_count: AtomicU64,
    counters: IndexCounters,
    closed: AtomicBool,
    /// Held shared by every mutation from the open check until its deltas
    /// are enqueued; `close` takes it exclusively before draining
    gate: RwLock<()>,
}

impl Index {
    /// Open (or create) an index with the standard analyzer
    pub fn open(store: Arc<dyn KvStore>, config: IndexConfig) -> Result<Self> {
        Self::open_with_analyzer(store, config, Arc::new(StandardAnalyzer))
    }

    /// Open (or create) an index with a custom analyzer
    ///
    /// A new store gets the version row and the `_id` field row. An existing
    /// store must carry the current schema version; its field cache and row
    /// key directory are rebuilt and `doc_count` is seeded from them.
    pub fn open_with_analyzer(
        store: Arc<dyn KvStore>,
        config: IndexConfig,
        analyzer: Arc<dyn Analyzer>,
    ) -> Result<Self> {
        config.validate()?;

        match store.get(&VERSION_KEY).map_err(IndexError::StoreRead)? {
            Some(value) => match Row::decode(&VERSION_KEY, &value)? {
                Row::Version(row) if row.version == SCHEMA_VERSION => {}
                Row::Version(row) => {
                    return Err(IndexError::IncompatibleVersion {
                        expected: SCHEMA_VERSION,
                        found: row.version,
                    })
                }
                other => {
                    return Err(IndexError::corrupt(
                        "version",
                        format!("found {} row under the version key", other.kind().name()),
                    ))
                }
            },
            None => store
                .set(&VERSION_KEY, &[SCHEMA_VERSION])
                .map_err(IndexError::StoreWrite)?,
        }

        let fields = FieldCache::load(&*store)?;
        let id_field = fields.ensure(ID_FIELD, &*store)?;
        if id_field != 0 {
            return Err(IndexError::corrupt(
                "field",
                format!("'{}' registered as field {} instead of 0", ID_FIELD, id_field),
            ));
        }

        let directory = RowDirectory::rebuild(&*store)?;
        let doc_count = directory.len() as u64;

        let analysis =
            AnalysisQueue::new(config.analysis_workers, analyzer, config.precision_step)?;
        let dictionary = DictionaryUpdater::start(Arc::clone(&store), config.dictionary.clone())?;

        info!(
            target: "strata::index",
            doc_count,
            fields = fields.len(),
            precision_step = config.precision_step,
            analysis_workers = config.analysis_workers,
            "Opened index"
        );

        Ok(Self {
            store,
            config,
            fields,
            directory,
            locks: DocLocks::new(),
            analysis,
            dictionary,
            doc_count: AtomicU64::new(doc_count),
            counters: IndexCounters::new(),
            closed: AtomicBool::new(false),
            gate: RwLock::new(()),
        })
    }

    /// Configuration the index was opened with
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Number of live documents
    pub fn doc_count(&self) -> u64 {
        self.doc_count.load(Ordering::Acquire)
    }

    /// Index or re-index a document
    ///
    /// Only rows that differ from the document's current rows are written,
    /// in one atomic commit. Returns once the commit is durable; dictionary
    /// counts follow asynchronously.
    pub fn update(&self, doc: Document) -> Result<()> {
        let _open = self.enter()?;
        let result = self.update_inner(doc);
        self.record(&result, IndexCounters::record_update);
        result
    }

    fn update_inner(&self, doc: Document) -> Result<()> {
        doc.validate()?;
        let doc = Arc::new(doc);

        let started = Instant::now();
        let analyzed = self.analysis.analyze(Arc::clone(&doc))?;
        self.counters.record_analysis_time(started.elapsed());

        let started = Instant::now();
        let new_rows = self.build(&doc, &analyzed)?;
        let result = self.locks.with_doc(doc.id(), || {
            let old_rows = self.load_rows(doc.id())?;
            let plan = DocumentPlan::new(&old_rows, &new_rows);
            self.apply(vec![plan])
        });
        self.counters.record_index_time(started.elapsed());
        result
    }

    /// Remove a document and all of its rows
    ///
    /// Deleting a document that does not exist is a no-op.
    pub fn delete(&self, id: impl AsRef<[u8]>) -> Result<()> {
        let _open = self.enter()?;
        let id = id.as_ref();
        let started = Instant::now();
        let result = self.locks.with_doc(id, || {
            let old_rows = self.load_rows(id)?;
            if old_rows.is_empty() {
                return Ok(());
            }
            let plan = DocumentPlan::new(&old_rows, &DocRows::empty(id));
            self.apply(vec![plan])
        });
        self.counters.record_index_time(started.elapsed());
        self.record(&result, IndexCounters::record_delete);
        result
    }

    /// Apply many updates and deletes as one atomic commit
    ///
    /// Either every operation in the batch is applied or none is.
    pub fn batch(&self, batch: Batch) -> Result<()> {
        let _open = self.enter()?;
        if batch.is_empty() {
            return Ok(());
        }
        let result = self.batch_inner(batch);
        match &result {
            Ok((updates, deletes)) => self.counters.record_batch(*updates, *deletes),
            Err(_) => self.counters.record_error(),
        }
        result.map(|_| ())
    }

    fn batch_inner(&self, batch: Batch) -> Result<(usize, usize)> {
        let ids = batch.ids();
        let mut docs = Vec::new();
        let mut deletes = Vec::new();
        for (id, op) in batch.into_ops() {
            match op {
                Some(doc) => {
                    doc.validate()?;
                    docs.push(Arc::new(doc));
                }
                None => deletes.push(id),
            }
        }

        let started = Instant::now();
        let analyzed = self.analysis.analyze_all(&docs)?;
        self.counters.record_analysis_time(started.elapsed());

        let started = Instant::now();
        let mut new_rows = docs
            .iter()
            .zip(&analyzed)
            .map(|(doc, analyzed)| self.build(doc, analyzed))
            .collect::<Result<Vec<_>>>()?;
        new_rows.extend(deletes.iter().map(|id| DocRows::empty(id)));

        let result = self.locks.with_docs(&ids, || {
            let plans = new_rows
                .iter()
                .map(|new| Ok(DocumentPlan::new(&self.load_rows(&new.id)?, new)))
                .collect::<Result<Vec<_>>>()?;
            self.apply(plans)
        });
        self.counters.record_index_time(started.elapsed());
        result.map(|_| (docs.len(), deletes.len()))
    }

    /// Wait until every dictionary delta enqueued so far is flushed
    pub fn drain_dictionary(&self, timeout: Duration) -> Result<()> {
        self.dictionary.drain(timeout)
    }

    /// Drain the dictionary, then stop the background workers
    ///
    /// Mutations already past their open check finish first, so their
    /// dictionary deltas are part of the drain.
    ///
    /// The store itself is left open for its owner. Returns `DrainTimeout`
    /// if pending dictionary deltas could not be flushed within the
    /// configured close timeout; the index is closed either way.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _gate = self.gate.write();
        let drained = self
            .dictionary
            .drain(self.config.dictionary.close_timeout());
        if let Err(e) = &drained {
            warn!(target: "strata::index", error = %e, "Closing index with unflushed dictionary deltas");
        }
        self.dictionary.shutdown();
        self.analysis.shutdown();
        info!(
            target: "strata::index",
            doc_count = self.doc_count(),
            "Closed index"
        );
        drained
    }

    /// Whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Counter snapshot
    pub fn stats(&self) -> IndexStats {
        self.counters
            .snapshot(self.doc_count(), self.fields.len(), self.dictionary.stats())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn enter(&self) -> Result<RwLockReadGuard<'_, ()>> {
        let gate = self.gate.read();
        if self.closed.load(Ordering::Acquire) {
            return Err(IndexError::Closed);
        }
        Ok(gate)
    }

    fn record<T>(&self, result: &Result<T>, on_success: fn(&IndexCounters)) {
        match result {
            Ok(_) => on_success(&self.counters),
            Err(_) => self.counters.record_error(),
        }
    }

    /// Intern every field name and build the document's rows
    fn build(&self, doc: &Document, analyzed: &AnalyzedDocument) -> Result<DocRows> {
        let indices = analyzed
            .field_names()
            .map(|name| self.fields.ensure(name, &*self.store))
            .collect::<Result<Vec<u16>>>()?;
        build_rows(doc, analyzed, &indices)
    }

    /// Current rows of a document; caller holds the document lock
    pub(crate) fn load_rows(&self, id: &[u8]) -> Result<DocRows> {
        let keys = self.directory.get(id);
        let snapshot = self.store.snapshot().map_err(IndexError::StoreRead)?;
        let mut rows = DocRows::empty(id);

        for key in keys {
            let value = snapshot
                .get(&key)
                .map_err(IndexError::StoreRead)?
                .ok_or_else(|| {
                    IndexError::corrupt("term", "row key directory refers to a missing row")
                })?;
            let (field, term, _) = decode_term_key(&key)?;
            if field != 0 {
                rows.terms.insert(DictionaryKey::new(field, term));
            }
            rows.rows.insert(key, value);
        }

        for item in snapshot
            .scan_prefix(&stored_doc_prefix(id))
            .map_err(IndexError::StoreRead)?
        {
            let (key, value) = item.map_err(IndexError::StoreRead)?;
            rows.rows.insert(key, value);
        }
        Ok(rows)
    }

    /// Commit the plans atomically, then publish their effects
    fn apply(&self, plans: Vec<DocumentPlan>) -> Result<()> {
        let mut batch = WriteBatch::with_capacity(plans.iter().map(|p| p.delta.len()).sum());
        for plan in &plans {
            plan.delta.write_into(&mut batch);
        }
        if !batch.is_empty() {
            self.store.commit(batch).map_err(IndexError::StoreWrite)?;
        }

        for plan in plans {
            match plan.doc_count_delta() {
                1 => {
                    self.doc_count.fetch_add(1, Ordering::AcqRel);
                }
                -1 => {
                    let _ = self.doc_count.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                        n.checked_sub(1)
                    });
                }
                _ => {}
            }
            self.counters
                .record_rows(plan.delta.upserts.len(), plan.delta.removals.len());
            debug!(
                target: "strata::index",
                doc_id = %String::from_utf8_lossy(&plan.id),
                rows_added = plan.delta.upserts.len(),
                rows_removed = plan.delta.removals.len(),
                rows_unchanged = plan.delta.unchanged,
                dictionary_deltas = plan.dictionary.len(),
                "Applied document"
            );
            self.directory.replace(&plan.id, plan.term_keys);
            if let Err(e) = self.dictionary.enqueue(plan.dictionary) {
                // Only possible while closing; the rows are already committed
                warn!(
                    target: "strata::index",
                    doc_id = %String::from_utf8_lossy(&plan.id),
                    error = %e,
                    "Dropped dictionary deltas"
                );
            }
        }
        Ok(())
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        if !self.is_closed() {
            let _ = self.close();
        }
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("doc_count", &self.doc_count())
            .field("fields", &self.fields.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
