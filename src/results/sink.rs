//! Shared result sink
//!
//! Every batch attempt reports here. Records are appended under one mutex,
//! while the progress counters are atomics so the driver can sample them at
//! any time without contending with writers.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

use crate::models::{ExecutionOutcome, ResultRecord, RunState, TestId};

struct Store {
    writer: Option<Box<dyn Write + Send>>,
    records: Vec<ResultRecord>,
    recorded: HashSet<TestId>,
}

/// Thread-safe append-only verdict store plus progress counters
pub struct ResultSink {
    store: Mutex<Store>,
    completed: AtomicUsize,
    total: usize,
}

impl ResultSink {
    /// In-memory sink
    pub fn new(total: usize) -> Self {
        Self {
            store: Mutex::new(Store {
                writer: None,
                records: Vec::new(),
                recorded: HashSet::new(),
            }),
            completed: AtomicUsize::new(0),
            total,
        }
    }

    /// Sink that also appends one text line per record to `writer`
    pub fn with_writer(total: usize, writer: impl Write + Send + 'static) -> Self {
        let sink = Self::new(total);
        sink.lock().writer = Some(Box::new(writer));
        sink
    }

    /// Sink appending to the file at `path`, creating it if needed
    pub fn open(path: impl AsRef<Path>, total: usize) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open result file: {}", path.display()))?;
        debug!("Appending results to {}", path.display());
        Ok(Self::with_writer(total, BufWriter::new(file)))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append the resolved part of `outcome` and advance the counter.
    ///
    /// Ids that already have a verdict are skipped, so each id is counted
    /// once. Counters advance even when the text store fails to write; the
    /// first write error is returned.
    pub fn add_outcome(&self, outcome: &ExecutionOutcome) -> io::Result<usize> {
        let mut store = self.lock();
        let mut added = 0;
        let mut write_error = None;

        for record in &outcome.resolved {
            if !store.recorded.insert(record.id.clone()) {
                warn!("Dropping duplicate verdict for {}", record.id);
                continue;
            }
            if let Some(writer) = store.writer.as_mut() {
                if let Err(e) = writeln!(writer, "{record}") {
                    write_error.get_or_insert(e);
                }
            }
            store.records.push(record.clone());
            added += 1;
        }

        if let Some(writer) = store.writer.as_mut() {
            if let Err(e) = writer.flush() {
                write_error.get_or_insert(e);
            }
        }

        self.completed.fetch_add(added, Ordering::Release);
        drop(store);

        match write_error {
            Some(e) => Err(e),
            None => Ok(added),
        }
    }

    /// Lock-free read of `(completed, total)`
    pub fn progress_snapshot(&self) -> RunState {
        RunState {
            completed: self.completed.load(Ordering::Acquire),
            total: self.total,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Copy of everything recorded so far, in arrival order
    pub fn records(&self) -> Vec<ResultRecord> {
        self.lock().records.clone()
    }
}
