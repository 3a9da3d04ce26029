//! Phase timing
//!
//! Splits a command's wall time into named phases for debug logging.

use std::time::{Duration, Instant};

/// Stopwatch with lap timing
#[derive(Debug)]
pub struct Stopwatch {
    start: Instant,
    last: Instant,
    laps: Vec<(String, Duration)>,
}

impl Stopwatch {
    /// Create a new stopwatch
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            laps: Vec::new(),
        }
    }

    /// Close the current phase and return how long it took
    pub fn lap(&mut self, label: impl Into<String>) -> Duration {
        let now = Instant::now();
        let lap = now.duration_since(self.last);
        self.last = now;
        self.laps.push((label.into(), lap));
        lap
    }

    /// Get total elapsed time
    pub fn total(&self) -> Duration {
        self.start.elapsed()
    }

    /// One-line `label=Nms` rendering of every lap
    pub fn format(&self) -> String {
        let mut parts: Vec<String> = self
            .laps
            .iter()
            .map(|(label, d)| format!("{label}={}ms", d.as_millis()))
            .collect();
        parts.push(format!("total={}ms", self.total().as_millis()));
        parts.join(" ")
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}
