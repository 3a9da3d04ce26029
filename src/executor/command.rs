//! Invocation construction
//!
//! Maps a batch onto one command line using the target binary's
//! `--gtest_filter` selection syntax.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::{Batch, TestId};
use crate::process::Invocation;

/// Flag that carries the test selection
pub const FILTER_FLAG: &str = "--gtest_filter=";

/// Separator between patterns inside a filter
pub const FILTER_SEPARATOR: char = ':';

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InvocationError {
    #[error("Cannot build an invocation for an empty batch")]
    EmptyBatch,
}

/// Join ids into one filter expression.
pub fn filter_expression(ids: &[TestId]) -> Result<String, InvocationError> {
    if ids.is_empty() {
        return Err(InvocationError::EmptyBatch);
    }
    let mut filter = String::new();
    for (idx, id) in ids.iter().enumerate() {
        if idx > 0 {
            filter.push(FILTER_SEPARATOR);
        }
        filter.push_str(id.as_str());
    }
    Ok(filter)
}

/// Program plus fixed leading arguments
#[derive(Clone, Debug)]
pub struct CommandTemplate {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    /// Whether `arg` is among the fixed leading arguments
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Command line that runs exactly the tests in `batch`
    pub fn build(&self, batch: &Batch) -> Result<Invocation, InvocationError> {
        let filter = filter_expression(batch.ids())?;
        Ok(Invocation::new(&self.program)
            .args(self.args.iter().cloned())
            .arg(format!("{FILTER_FLAG}{filter}")))
    }

    /// Command line that lists the binary's tests without running them
    pub fn list(&self) -> Invocation {
        Invocation::new(&self.program)
            .args(self.args.iter().cloned())
            .arg("--gtest_list_tests")
    }
}
