//! Test execution engine
//!
//! Worker pool, per-batch process supervision, retry policy and the driver
//! that ties them to a result sink.

mod batch;
mod command;
mod parser;
mod pool;
mod retry;
mod scheduler;

pub use batch::{BatchRunner, RunnerSettings};
pub use command::{CommandTemplate, FILTER_SEPARATOR};
pub use parser::MarkerSet;
pub use retry::RetryPolicy;
pub use scheduler::{RunReport, Scheduler};
