//! Results module
//!
//! The live verdict sink shared by workers, and persistent run records.

mod sink;
mod storage;

pub use sink::ResultSink;
pub use storage::{ExportFormat, ResultsStorage, RunConfigInfo, StoredRun, VerdictCounts};
