//! Output formatting module
//!
//! Provides various output formats for run results and live progress.

mod formatter;
mod progress;

pub use formatter::{OutputFormat, ResultFormatter};
pub use progress::ProgressReporter;
