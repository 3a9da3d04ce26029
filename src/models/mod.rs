//! Data models for batch test execution
//!
//! This module contains all data structures shared between the pool,
//! the batch runner and the result sink.

mod outcome;
mod test_id;

pub use outcome::{ExecutionOutcome, ResultRecord, RunState, Verdict};
pub use test_id::{Batch, TestId};
