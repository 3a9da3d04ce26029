//! Batch execution
//!
//! Runs one batch in one process, follows its output marker by marker and
//! classifies every requested test. Reads never block: the worker sleeps for
//! the poll interval between checks and that is the only place it waits.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::command::CommandTemplate;
use super::parser::{Marker, MarkerSet, OutputParser};
use crate::models::{Batch, ExecutionOutcome, ResultRecord, TestId, Verdict};
use crate::process::{ExitState, ProcessHandle, ProcessLauncher};

/// Timing knobs for one attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Longest a single test may run after its start marker
    pub timeout: Duration,
    /// Longest the process may go without any marker while no test is running
    pub idle_timeout: Duration,
    pub poll_interval: Duration,
    /// How long the final drain waits for output still in flight
    pub drain_grace: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            drain_grace: Duration::from_millis(500),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Running { id: TestId, started: Instant },
}

/// Bookkeeping for one attempt
#[derive(Debug)]
struct Attempt {
    order: Vec<TestId>,
    remaining: HashSet<TestId>,
    resolved: Vec<ResultRecord>,
    phase: Phase,
    last_activity: Instant,
}

impl Attempt {
    fn new(batch: &Batch, now: Instant) -> Self {
        Self {
            order: batch.ids().to_vec(),
            remaining: batch.ids().iter().cloned().collect(),
            resolved: Vec::new(),
            phase: Phase::Idle,
            last_activity: now,
        }
    }

    fn apply(&mut self, marker: Marker, now: Instant) {
        match marker {
            Marker::Start(id) => {
                if !self.remaining.contains(&id) {
                    debug!("Ignoring start of unrequested or finished test {}", id);
                    return;
                }
                debug!("Test {} started", id);
                self.last_activity = now;
                self.phase = Phase::Running { id, started: now };
            }
            Marker::End(named, verdict) => {
                let running = match &self.phase {
                    Phase::Running { id, .. } => Some(id.clone()),
                    Phase::Idle => None,
                };
                let Some(id) = named.or_else(|| running.clone()) else {
                    return;
                };
                if !self.remaining.contains(&id) {
                    return;
                }
                debug!("Test {} finished: {}", id, verdict);
                self.last_activity = now;
                self.resolve(&id, verdict);
                if running.as_ref() == Some(&id) {
                    self.phase = Phase::Idle;
                }
            }
        }
    }

    fn resolve(&mut self, id: &TestId, verdict: Verdict) {
        if self.remaining.remove(id) {
            self.resolved.push(ResultRecord::new(id.clone(), verdict));
        }
    }

    /// Classify the in-flight test, if any, and return to idle.
    fn resolve_running(&mut self, verdict: Verdict) -> Option<TestId> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Running { id, .. } => {
                self.resolve(&id, verdict);
                Some(id)
            }
            Phase::Idle => None,
        }
    }

    fn running(&self) -> Option<(&TestId, Instant)> {
        match &self.phase {
            Phase::Running { id, started } => Some((id, *started)),
            Phase::Idle => None,
        }
    }

    fn into_outcome(self, note: Option<String>) -> ExecutionOutcome {
        let remaining: Vec<TestId> = self
            .order
            .into_iter()
            .filter(|id| self.remaining.contains(id))
            .collect();
        ExecutionOutcome {
            resolved: self.resolved,
            note: if remaining.is_empty() { None } else { note },
            remaining,
        }
    }
}

/// Why the poll loop stopped
#[derive(Debug)]
enum Stop {
    Exited(ExitState),
    TimedOut(TestId),
    Idle,
}

/// Executes batches against a target binary
pub struct BatchRunner {
    launcher: Arc<dyn ProcessLauncher>,
    template: CommandTemplate,
    markers: MarkerSet,
    settings: RunnerSettings,
}

impl BatchRunner {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, template: CommandTemplate) -> Self {
        Self {
            launcher,
            template,
            markers: MarkerSet::default(),
            settings: RunnerSettings::default(),
        }
    }

    pub fn with_markers(mut self, markers: MarkerSet) -> Self {
        self.markers = markers;
        self
    }

    pub fn with_settings(mut self, settings: RunnerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Run `batch` once. Never fails: anything not classified comes back in
    /// `remaining`.
    pub fn execute_batch(&self, batch: &Batch) -> ExecutionOutcome {
        let invocation = match self.template.build(batch) {
            Ok(invocation) => invocation,
            Err(e) => return ExecutionOutcome::unresolved(batch, e.to_string()),
        };

        let mut process = match self.launcher.spawn(&invocation) {
            Ok(process) => process,
            Err(e) => {
                warn!("Batch {} could not start: {}", batch, e);
                return ExecutionOutcome::unresolved(batch, format!("spawn failed: {e}"));
            }
        };

        info!(
            "Running batch {} ({} tests, pid {})",
            batch,
            batch.len(),
            process
                .pid()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string())
        );

        let mut attempt = Attempt::new(batch, Instant::now());
        let mut parser = OutputParser::new(self.markers.clone());
        let stop = self.supervise(process.as_mut(), &mut attempt, &mut parser);

        // Output written just before exit may still be in flight.
        let tail = process.read_remaining(self.settings.drain_grace);
        let now = Instant::now();
        for marker in parser.feed(&tail).into_iter().chain(parser.finish()) {
            attempt.apply(marker, now);
        }

        let note = match &stop {
            Stop::Exited(state) => {
                if !state.success() {
                    if let Some(id) = attempt.resolve_running(Verdict::Interrupted) {
                        warn!("Test {} interrupted: process {}", id, state);
                    }
                }
                format!("process ended with {state}")
            }
            Stop::TimedOut(id) => format!("process killed after {id} timed out"),
            Stop::Idle => format!(
                "no test output for {}s",
                self.settings.idle_timeout.as_secs_f64()
            ),
        };

        let outcome = attempt.into_outcome(Some(note));
        debug_assert!(outcome.is_partition_of(batch));
        debug!("Batch {} finished: {}", batch, outcome);
        outcome
    }

    fn supervise(
        &self,
        process: &mut dyn ProcessHandle,
        attempt: &mut Attempt,
        parser: &mut OutputParser,
    ) -> Stop {
        loop {
            // Sample exit before draining so output written before the exit
            // is always parsed before the exit is acted on.
            let exited = process.poll_exit();

            let bytes = process.read_available();
            let now = Instant::now();
            for marker in parser.feed(&bytes) {
                attempt.apply(marker, now);
            }

            if let Some(state) = exited {
                return Stop::Exited(state);
            }

            let now = Instant::now();
            match attempt.running() {
                Some((id, started)) if now.duration_since(started) >= self.settings.timeout => {
                    let id = id.clone();
                    warn!(
                        "Test {} exceeded {}s, terminating",
                        id,
                        self.settings.timeout.as_secs_f64()
                    );
                    process.terminate();
                    attempt.resolve_running(Verdict::TimedOut);
                    return Stop::TimedOut(id);
                }
                None if now.duration_since(attempt.last_activity) >= self.settings.idle_timeout => {
                    warn!("Process idle without test output, terminating");
                    process.terminate();
                    return Stop::Idle;
                }
                _ => {}
            }

            thread::sleep(self.settings.poll_interval);
        }
    }
}
