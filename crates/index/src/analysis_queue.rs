//! Bounded analysis worker pool
//!
//! A fixed set of threads pulls documents from a FIFO queue and runs
//! [`analyze_document`] on them. Callers block on a per-job reply channel, so
//! `update` waits for its own analysis while several writers analyze in
//! parallel.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use strata_core::{Document, IndexError, Result};
use tracing::error;

use crate::analysis::{analyze_document, AnalyzedDocument, Analyzer};

struct AnalysisJob {
    doc: Arc<Document>,
    reply: SyncSender<AnalyzedDocument>,
}

struct QueueInner {
    jobs: Mutex<VecDeque<AnalysisJob>>,
    work_ready: Condvar,
    shutdown: AtomicBool,
    analyzer: Arc<dyn Analyzer>,
    precision_step: u8,
    completed: AtomicU64,
    panics: AtomicU64,
}

/// Pending analysis of one document
pub struct AnalysisTicket {
    reply: Receiver<AnalyzedDocument>,
}

impl AnalysisTicket {
    /// Block until the result is ready
    ///
    /// Fails if the worker panicked while analyzing the document.
    pub fn wait(self) -> Result<AnalyzedDocument> {
        self.reply
            .recv()
            .map_err(|_| IndexError::Analysis("analysis worker dropped the document".to_string()))
    }
}

/// Pool of analysis threads
pub struct AnalysisQueue {
    inner: Arc<QueueInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    num_threads: usize,
}

impl AnalysisQueue {
    /// Start `num_threads` workers named `strata-analysis-0`, `strata-analysis-1`, ...
    pub fn new(num_threads: usize, analyzer: Arc<dyn Analyzer>, precision_step: u8) -> Result<Self> {
        let num_threads = num_threads.max(1);
        let inner = Arc::new(QueueInner {
            jobs: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
            analyzer,
            precision_step,
            completed: AtomicU64::new(0),
            panics: AtomicU64::new(0),
        });

        let queue = Self {
            inner: Arc::clone(&inner),
            workers: Mutex::new(Vec::with_capacity(num_threads)),
            num_threads,
        };
        for i in 0..num_threads {
            let inner_clone = Arc::clone(&inner);
            let handle = std::thread::Builder::new()
                .name(format!("strata-analysis-{}", i))
                .spawn(move || worker_loop(&inner_clone))
                .map_err(|e| {
                    IndexError::Analysis(format!("failed to spawn analysis worker: {}", e))
                })?;
            queue.workers.lock().push(handle);
        }
        Ok(queue)
    }

    /// Queue a document for analysis
    pub fn submit(&self, doc: Arc<Document>) -> Result<AnalysisTicket> {
        // Checked under the queue lock so a job is never pushed after the
        // workers have seen the shutdown flag and exited
        let mut jobs = self.inner.jobs.lock();
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(IndexError::Closed);
        }
        let (reply, receiver) = sync_channel(1);
        jobs.push_back(AnalysisJob { doc, reply });
        drop(jobs);
        self.inner.work_ready.notify_one();
        Ok(AnalysisTicket { reply: receiver })
    }

    /// Analyze one document, blocking until done
    pub fn analyze(&self, doc: Arc<Document>) -> Result<AnalyzedDocument> {
        self.submit(doc)?.wait()
    }

    /// Analyze many documents in parallel, results in input order
    pub fn analyze_all(&self, docs: &[Arc<Document>]) -> Result<Vec<AnalyzedDocument>> {
        let tickets = docs
            .iter()
            .map(|doc| self.submit(Arc::clone(doc)))
            .collect::<Result<Vec<_>>>()?;
        tickets.into_iter().map(AnalysisTicket::wait).collect()
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.num_threads
    }

    /// Documents analyzed so far
    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }

    /// Analyzer panics caught so far
    pub fn panics(&self) -> u64 {
        self.inner.panics.load(Ordering::Relaxed)
    }

    /// Stop accepting work, finish queued jobs and join the workers
    pub fn shutdown(&self) {
        {
            let _jobs = self.inner.jobs.lock();
            self.inner.shutdown.store(true, Ordering::Release);
            self.inner.work_ready.notify_all();
        }
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for AnalysisQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(inner: &QueueInner) {
    loop {
        let job = {
            let mut jobs = inner.jobs.lock();
            loop {
                if let Some(job) = jobs.pop_front() {
                    break job;
                }
                if inner.shutdown.load(Ordering::Acquire) {
                    return;
                }
                inner.work_ready.wait(&mut jobs);
            }
        };

        let AnalysisJob { doc, reply } = job;
        let analyzer = &*inner.analyzer;
        let step = inner.precision_step;
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            analyze_document(&doc, analyzer, step)
        })) {
            Ok(analyzed) => {
                inner.completed.fetch_add(1, Ordering::Relaxed);
                // The caller may have given up waiting
                let _ = reply.send(analyzed);
            }
            Err(e) => {
                inner.panics.fetch_add(1, Ordering::Relaxed);
                error!(
                    target: "strata::analysis",
                    doc_id = %String::from_utf8_lossy(doc.id()),
                    "analyzer panicked: {:?}",
                    e.downcast_ref::<&str>().copied().unwrap_or("(non-string panic)")
                );
                // Dropping `reply` fails the caller's wait
            }
        }
    }
}
