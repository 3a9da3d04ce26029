//! Verdicts and execution outcomes
//!
//! Defines the per-test verdict taxonomy, the persisted result record and
//! the outcome of one batch execution attempt.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::{Batch, TestId};

/// Final classification of a test
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
    Skipped,
    TimedOut,
    Interrupted,
}

impl Verdict {
    pub fn all() -> [Verdict; 5] {
        [
            Verdict::Passed,
            Verdict::Failed,
            Verdict::Skipped,
            Verdict::TimedOut,
            Verdict::Interrupted,
        ]
    }

    /// Label used in the text result store
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Passed => "Passed",
            Verdict::Failed => "Failed",
            Verdict::Skipped => "Skipped",
            Verdict::TimedOut => "Timed_out",
            Verdict::Interrupted => "Interrupted",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Verdict::Passed => "✓",
            Verdict::Failed => "✗",
            Verdict::Skipped => "○",
            Verdict::TimedOut => "⏱",
            Verdict::Interrupted => "!",
        }
    }

    /// Passed and skipped tests do not fail the run.
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Passed | Verdict::Skipped)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One persisted line of the result store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: TestId,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ResultRecord {
    pub fn new(id: TestId, verdict: Verdict) -> Self {
        Self {
            id,
            verdict,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.id, self.verdict)?;
        // Only failures carry their reason into the text line.
        match &self.reason {
            Some(reason) if self.verdict == Verdict::Failed => write!(f, " ({reason})"),
            _ => Ok(()),
        }
    }
}

/// Result of one batch execution attempt.
///
/// `resolved` and `remaining` together always partition the input batch.
#[derive(Clone, Debug, Default)]
pub struct ExecutionOutcome {
    pub resolved: Vec<ResultRecord>,
    pub remaining: Vec<TestId>,
    /// Why the attempt ended without resolving its remaining ids, if known.
    pub note: Option<String>,
}

impl ExecutionOutcome {
    /// Outcome of an attempt that never got to run anything.
    pub fn unresolved(batch: &Batch, note: impl Into<String>) -> Self {
        Self {
            resolved: Vec::new(),
            remaining: batch.ids().to_vec(),
            note: Some(note.into()),
        }
    }

    pub fn with(&self, verdict: Verdict) -> impl Iterator<Item = &TestId> {
        self.resolved
            .iter()
            .filter(move |r| r.verdict == verdict)
            .map(|r| &r.id)
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        self.with(verdict).count()
    }

    pub fn made_progress(&self) -> bool {
        !self.resolved.is_empty()
    }

    /// Check that `resolved ∪ remaining` is exactly `batch`, with no duplicates.
    pub fn is_partition_of(&self, batch: &Batch) -> bool {
        let mut seen = HashSet::new();
        let all = self
            .resolved
            .iter()
            .map(|r| &r.id)
            .chain(self.remaining.iter());
        for id in all {
            if !seen.insert(id) {
                return false;
            }
        }
        seen.len() == batch.len() && batch.ids().iter().all(|id| seen.contains(id))
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "passed={} failed={} skipped={} timed_out={} interrupted={} remaining={}",
            self.count(Verdict::Passed),
            self.count(Verdict::Failed),
            self.count(Verdict::Skipped),
            self.count(Verdict::TimedOut),
            self.count(Verdict::Interrupted),
            self.remaining.len()
        )
    }
}

/// Snapshot of run progress
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunState {
    pub completed: usize,
    pub total: usize,
}

impl RunState {
    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(names: &[&str]) -> Batch {
        Batch::new(names.iter().map(|n| TestId::from(*n)))
    }

    #[test]
    fn test_verdict_labels() {
        assert_eq!(Verdict::TimedOut.to_string(), "Timed_out");
        assert_eq!(Verdict::Interrupted.label(), "Interrupted");
        assert!(Verdict::Skipped.is_success());
        assert!(!Verdict::TimedOut.is_success());
    }

    #[test]
    fn test_record_line() {
        let record = ResultRecord::new("Foo.Bar".into(), Verdict::Passed);
        assert_eq!(record.to_string(), "Foo.Bar : Passed");

        let record = ResultRecord::new("Foo.Baz".into(), Verdict::Failed)
            .with_reason("no progress after 3 attempts");
        assert_eq!(
            record.to_string(),
            "Foo.Baz : Failed (no progress after 3 attempts)"
        );

        let record = ResultRecord::new("Foo.Crash".into(), Verdict::Interrupted)
            .with_reason("crashed on 2 attempts");
        assert_eq!(record.to_string(), "Foo.Crash : Interrupted");
        assert_eq!(record.reason.as_deref(), Some("crashed on 2 attempts"));
    }

    #[test]
    fn test_partition_check() {
        let input = batch(&["A.a", "A.b", "A.c"]);
        let outcome = ExecutionOutcome {
            resolved: vec![ResultRecord::new("A.a".into(), Verdict::Passed)],
            remaining: vec!["A.b".into(), "A.c".into()],
            note: None,
        };
        assert!(outcome.is_partition_of(&input));

        let duplicated = ExecutionOutcome {
            resolved: vec![ResultRecord::new("A.a".into(), Verdict::Passed)],
            remaining: vec!["A.a".into(), "A.b".into(), "A.c".into()],
            note: None,
        };
        assert!(!duplicated.is_partition_of(&input));

        let dropped = ExecutionOutcome {
            resolved: Vec::new(),
            remaining: vec!["A.b".into(), "A.c".into()],
            note: None,
        };
        assert!(!dropped.is_partition_of(&input));
    }

    #[test]
    fn test_unresolved_outcome() {
        let input = batch(&["A.a", "A.b"]);
        let outcome = ExecutionOutcome::unresolved(&input, "spawn failed");
        assert!(!outcome.made_progress());
        assert!(outcome.is_partition_of(&input));
        assert_eq!(outcome.note.as_deref(), Some("spawn failed"));
    }

    #[test]
    fn test_run_state() {
        let state = RunState {
            completed: 3,
            total: 4,
        };
        assert!(!state.is_complete());
        assert_eq!(state.to_string(), "3/4");
        assert!(RunState {
            completed: 0,
            total: 0
        }
        .is_complete());
    }
}
