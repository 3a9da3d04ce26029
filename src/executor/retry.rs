//! Resubmission policy
//!
//! Decides what happens to the ids an attempt left unresolved. Attempts that
//! resolve something shrink the remaining set on their own; attempts that
//! resolve nothing are charged against a per-id budget so that an id which
//! kills the binary before announcing itself cannot loop forever.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

use crate::models::{Batch, ExecutionOutcome, ResultRecord, TestId, Verdict};

/// Retry limits applied to unresolved and crashed tests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts without progress an id may consume before it is failed
    pub max_attempts: u32,
    /// Rerun a test that crashed the binary instead of recording `Interrupted`
    pub retry_interrupted: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_interrupted: false,
        }
    }
}

/// Per-id count of charged attempts, shared by all workers
#[derive(Debug, Default)]
pub struct AttemptLedger {
    counts: Mutex<HashMap<TestId, u32>>,
}

impl AttemptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more attempt for `id` and return the new count.
    pub fn charge(&self, id: &TestId) -> u32 {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let count = counts.entry(id.clone()).or_insert(0);
        *count += 1;
        *count
    }

    #[cfg(test)]
    pub fn attempts(&self, id: &TestId) -> u32 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
            .unwrap_or(0)
    }
}

/// What to record now and what to run again
#[derive(Debug, Default)]
pub struct Settlement {
    /// Final verdicts to persist; `remaining` lists every id in `follow_up`
    pub outcome: ExecutionOutcome,
    pub follow_up: Vec<Batch>,
}

impl RetryPolicy {
    pub fn settle(&self, raw: ExecutionOutcome, ledger: &AttemptLedger) -> Settlement {
        let made_progress = raw.made_progress();
        let cause = raw
            .note
            .clone()
            .unwrap_or_else(|| "process ended before the test started".to_string());

        let mut resolved = Vec::with_capacity(raw.resolved.len());
        let mut follow_up = Vec::new();
        let mut requeued = Vec::new();

        for record in raw.resolved {
            if self.retry_interrupted && record.verdict == Verdict::Interrupted {
                let attempts = ledger.charge(&record.id);
                if attempts < self.max_attempts {
                    debug!("Retrying crashed test {} (attempt {})", record.id, attempts);
                    requeued.push(record.id.clone());
                    follow_up.push(Batch::new([record.id]));
                    continue;
                }
                resolved.push(record.with_reason(format!("crashed on {attempts} attempts")));
                continue;
            }
            resolved.push(record);
        }

        if made_progress {
            if !raw.remaining.is_empty() {
                requeued.extend(raw.remaining.iter().cloned());
                follow_up.push(Batch::new(raw.remaining));
            }
        } else {
            let mut survivors = Vec::new();
            for id in raw.remaining {
                let attempts = ledger.charge(&id);
                if attempts >= self.max_attempts {
                    warn!("Giving up on {} after {} attempts: {}", id, attempts, cause);
                    resolved.push(
                        ResultRecord::new(id, Verdict::Failed).with_reason(format!(
                            "no progress after {attempts} attempts: {cause}"
                        )),
                    );
                } else {
                    survivors.push(id);
                }
            }
            requeued.extend(survivors.iter().cloned());
            // Isolate ids so one poisonous test cannot starve the others.
            follow_up.extend(Batch::new(survivors).singletons());
        }

        Settlement {
            outcome: ExecutionOutcome {
                resolved,
                remaining: requeued,
                note: raw.note,
            },
            follow_up,
        }
    }
}
