//! Run driver
//!
//! Partitions the discovered ids into batches, feeds them to a worker pool
//! and watches the result sink until every id has a verdict.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::batch::BatchRunner;
use super::pool::{PoolError, Submitter, WorkerPool};
use super::retry::{AttemptLedger, RetryPolicy};
use crate::models::{Batch, ResultRecord, RunState, TestId, Verdict};
use crate::results::ResultSink;

/// Outcome of a whole run
#[derive(Clone, Debug)]
pub struct RunReport {
    pub records: Vec<ResultRecord>,
    pub state: RunState,
    pub elapsed: Duration,
    /// The pool ran dry before every id had a verdict
    pub stalled: bool,
}

impl RunReport {
    pub fn count(&self, verdict: Verdict) -> usize {
        self.records.iter().filter(|r| r.verdict == verdict).count()
    }

    /// Every id has a verdict and none of them is a failure
    pub fn all_succeeded(&self) -> bool {
        !self.stalled
            && self.state.is_complete()
            && self.records.iter().all(|r| r.verdict.is_success())
    }
}

/// State shared by every batch task of one run
struct TaskContext {
    runner: Arc<BatchRunner>,
    policy: RetryPolicy,
    ledger: AttemptLedger,
    sink: Arc<ResultSink>,
    submitter: Submitter,
}

fn submit_batch(ctx: &Arc<TaskContext>, batch: Batch) -> Result<(), PoolError> {
    let task_ctx = ctx.clone();
    ctx.submitter
        .submit(move || run_batch(&task_ctx, batch))
        .map(|_| ())
}

fn run_batch(ctx: &Arc<TaskContext>, batch: Batch) {
    let raw = ctx.runner.execute_batch(&batch);
    let settlement = ctx.policy.settle(raw, &ctx.ledger);
    let mut outcome = settlement.outcome;

    for follow_up in settlement.follow_up {
        debug!("Resubmitting {}", follow_up);
        if let Err(e) = submit_batch(ctx, follow_up.clone()) {
            warn!("Could not resubmit {}: {}", follow_up, e);
            let dropped = follow_up.into_ids();
            outcome.remaining.retain(|id| !dropped.contains(id));
            outcome.resolved.extend(dropped.into_iter().map(|id| {
                ResultRecord::new(id, Verdict::Failed).with_reason(format!("not rescheduled: {e}"))
            }));
        }
    }

    if let Err(e) = ctx.sink.add_outcome(&outcome) {
        warn!("Failed to write results for {}: {}", batch, e);
    }
}

/// Drives one run across a fixed number of workers
pub struct Scheduler {
    runner: Arc<BatchRunner>,
    policy: RetryPolicy,
    jobs: usize,
    batch_size: Option<usize>,
    refresh_interval: Duration,
}

impl Scheduler {
    pub fn new(runner: BatchRunner, jobs: usize) -> Self {
        Self {
            runner: Arc::new(runner),
            policy: RetryPolicy::default(),
            jobs: jobs.max(1),
            batch_size: None,
            refresh_interval: Duration::from_millis(100),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fixed initial batch size; by default the ids are spread evenly over
    /// the workers.
    pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size.filter(|&size| size > 0);
        self
    }

    #[cfg(test)]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Initial batch size used for `total` ids
    pub fn batch_size_for(&self, total: usize) -> usize {
        self.batch_size
            .unwrap_or_else(|| total.div_ceil(self.jobs))
            .max(1)
    }

    #[cfg(test)]
    pub fn run(&self, ids: Vec<TestId>, sink: Arc<ResultSink>) -> Result<RunReport, PoolError> {
        self.run_with_progress(ids, sink, |_| {})
    }

    /// Run every id to a verdict, calling `progress` with each sampled
    /// snapshot.
    pub fn run_with_progress<F>(
        &self,
        ids: Vec<TestId>,
        sink: Arc<ResultSink>,
        mut progress: F,
    ) -> Result<RunReport, PoolError>
    where
        F: FnMut(RunState),
    {
        let started = Instant::now();
        let batches = Batch::new(ids).chunks(self.batch_size_for(sink.total()));
        if batches.is_empty() {
            let state = sink.progress_snapshot();
            progress(state);
            return Ok(RunReport {
                records: sink.records(),
                state,
                elapsed: started.elapsed(),
                stalled: false,
            });
        }

        let pool = WorkerPool::new(self.jobs)?;
        info!(
            "Running {} tests in {} batches on {} workers",
            sink.total(),
            batches.len(),
            pool.size()
        );

        let ctx = Arc::new(TaskContext {
            runner: self.runner.clone(),
            policy: self.policy,
            ledger: AttemptLedger::new(),
            sink: sink.clone(),
            submitter: pool.submitter(),
        });
        let mut handles = Vec::with_capacity(batches.len());
        for batch in batches {
            let task_ctx = ctx.clone();
            handles.push(pool.submit(move || run_batch(&task_ctx, batch))?);
        }

        let mut last = None;
        let stalled = loop {
            let state = sink.progress_snapshot();
            if last != Some(state) {
                progress(state);
                last = Some(state);
            }
            if state.is_complete() {
                break false;
            }
            if pool.is_idle() {
                // A task may have recorded between the two samples.
                let state = sink.progress_snapshot();
                if state.is_complete() {
                    progress(state);
                    break false;
                }
                warn!("Worker pool went idle at {} without finishing", state);
                break true;
            }
            thread::sleep(self.refresh_interval);
        };

        pool.shutdown();
        drop(ctx);

        // The queue is drained, so every handle is already settled.
        let panicked = handles
            .into_iter()
            .filter_map(|handle| handle.join().err())
            .filter(|e| matches!(e, PoolError::TaskPanicked))
            .count();
        if panicked > 0 {
            warn!("{} initial batches panicked before recording results", panicked);
        }

        let report = RunReport {
            records: sink.records(),
            state: sink.progress_snapshot(),
            elapsed: started.elapsed(),
            stalled,
        };
        info!(
            "Run finished: {} in {:.2}s",
            report.state,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }
}
