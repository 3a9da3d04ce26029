//! Process supervision capability
//!
//! The batch runner only needs to start a command, read whatever output has
//! arrived without blocking, check for exit and kill the process. Those
//! operations are abstracted here so the runner can be driven by a real
//! child process or by a scripted fake in tests.

mod child;

pub use child::ChildLauncher;

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while creating a process
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("Executable not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to spawn {program}: {source}")]
    Io {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SpawnError {
    pub(crate) fn from_io(program: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            SpawnError::NotFound(program.to_path_buf())
        } else {
            SpawnError::Io {
                program: program.to_path_buf(),
                source,
            }
        }
    }
}

/// A fully resolved command line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Std command for this invocation, with no stdio configured
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a process ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitState {
    /// Exited with a status code
    Code(i32),
    /// Killed by a signal or otherwise ended without a code
    Signaled,
}

impl ExitState {
    pub fn success(&self) -> bool {
        matches!(self, ExitState::Code(0))
    }
}

impl From<std::process::ExitStatus> for ExitState {
    fn from(status: std::process::ExitStatus) -> Self {
        status.code().map(ExitState::Code).unwrap_or(ExitState::Signaled)
    }
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitState::Code(code) => write!(f, "exit code {code}"),
            ExitState::Signaled => write!(f, "terminated by signal"),
        }
    }
}

/// A running process owned by one batch attempt.
///
/// None of these methods may block for longer than the grace period handed
/// to [`ProcessHandle::read_remaining`].
pub trait ProcessHandle: Send {
    /// Bytes of combined stdout/stderr that arrived since the last read.
    fn read_available(&mut self) -> Vec<u8>;

    /// Final drain after exit, waiting at most `grace` for buffered output.
    fn read_remaining(&mut self, grace: Duration) -> Vec<u8> {
        let _ = grace;
        self.read_available()
    }

    /// Exit state, or `None` while the process is still running.
    fn poll_exit(&mut self) -> Option<ExitState>;

    /// Forcibly stop the process.
    fn terminate(&mut self);

    fn pid(&self) -> Option<u32> {
        None
    }
}

/// Creates processes for invocations
pub trait ProcessLauncher: Send + Sync {
    fn spawn(&self, invocation: &Invocation) -> Result<Box<dyn ProcessHandle>, SpawnError>;
}

impl<F> ProcessLauncher for F
where
    F: Fn(&Invocation) -> Result<Box<dyn ProcessHandle>, SpawnError> + Send + Sync,
{
    fn spawn(&self, invocation: &Invocation) -> Result<Box<dyn ProcessHandle>, SpawnError> {
        self(invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_display() {
        let inv = Invocation::new("/opt/tests_bin")
            .arg("--gtest_color=no")
            .arg("--gtest_filter=A.a:B.b");
        assert_eq!(
            inv.to_string(),
            "/opt/tests_bin --gtest_color=no --gtest_filter=A.a:B.b"
        );
    }

    #[test]
    fn test_exit_state() {
        assert!(ExitState::Code(0).success());
        assert!(!ExitState::Code(1).success());
        assert!(!ExitState::Signaled.success());
        assert_eq!(ExitState::Code(3).to_string(), "exit code 3");
    }
}
