//! Child process implementation of [`ProcessHandle`]
//!
//! stdout and stderr are each read by a dedicated thread that forwards whole
//! lines over a channel, so the supervising worker can poll without blocking
//! and the two streams interleave at line granularity.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{ExitState, Invocation, ProcessHandle, ProcessLauncher, SpawnError};

/// Launches real child processes
#[derive(Clone, Copy, Debug, Default)]
pub struct ChildLauncher;

impl ChildLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for ChildLauncher {
    fn spawn(&self, invocation: &Invocation) -> Result<Box<dyn ProcessHandle>, SpawnError> {
        Ok(Box::new(ChildProcess::spawn(invocation)?))
    }
}

/// A spawned child with line-forwarding reader threads
pub struct ChildProcess {
    child: Child,
    output: Receiver<Vec<u8>>,
    exit: Option<ExitState>,
}

impl ChildProcess {
    pub fn spawn(invocation: &Invocation) -> Result<Self, SpawnError> {
        let mut child = invocation
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SpawnError::from_io(&invocation.program, source))?;

        let (sender, output) = crossbeam_channel::unbounded();
        let pid = child.id();
        let streams: [(&str, Option<Box<dyn Read + Send>>); 2] = [
            ("stdout", child.stdout.take().map(|s| Box::new(s) as _)),
            ("stderr", child.stderr.take().map(|s| Box::new(s) as _)),
        ];

        for (name, stream) in streams {
            let Some(stream) = stream else { continue };
            let sender = sender.clone();
            let spawned = thread::Builder::new()
                .name(format!("{name}-{pid}"))
                .spawn(move || forward_lines(stream, sender));
            if let Err(source) = spawned {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SpawnError::Io {
                    program: invocation.program.clone(),
                    source,
                });
            }
        }

        debug!("Spawned pid {}: {}", pid, invocation);
        Ok(Self {
            child,
            output,
            exit: None,
        })
    }
}

fn forward_lines(stream: Box<dyn Read + Send>, sender: Sender<Vec<u8>>) {
    let mut reader = BufReader::new(stream);
    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                if sender.send(line).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

impl ProcessHandle for ChildProcess {
    fn read_available(&mut self) -> Vec<u8> {
        self.output.try_iter().flatten().collect()
    }

    fn read_remaining(&mut self, grace: Duration) -> Vec<u8> {
        let deadline = Instant::now() + grace;
        let mut bytes = Vec::new();
        loop {
            match self.output.recv_deadline(deadline) {
                Ok(chunk) => bytes.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        bytes
    }

    fn poll_exit(&mut self) -> Option<ExitState> {
        if self.exit.is_some() {
            return self.exit;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit = Some(status.into());
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to query pid {}: {}", self.child.id(), e);
                self.exit = Some(ExitState::Signaled);
            }
        }
        self.exit
    }

    fn terminate(&mut self) {
        if self.exit.is_some() {
            return;
        }
        if let Err(e) = self.child.kill() {
            debug!("Kill of pid {} failed: {}", self.child.id(), e);
        }
        self.exit = Some(match self.child.wait() {
            Ok(status) => status.into(),
            Err(_) => ExitState::Signaled,
        });
    }

    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if self.poll_exit().is_none() {
            self.terminate();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation::new("/bin/sh").arg("-c").arg(script)
    }

    fn wait_exit(process: &mut ChildProcess) -> ExitState {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(state) = process.poll_exit() {
                return state;
            }
            assert!(Instant::now() < deadline, "process did not exit");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_collects_output_and_exit_code() {
        let mut process = ChildProcess::spawn(&sh("echo one; echo two >&2; exit 3")).unwrap();
        let state = wait_exit(&mut process);
        assert_eq!(state, ExitState::Code(3));

        let mut output = process.read_available();
        output.extend(process.read_remaining(Duration::from_secs(2)));
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("one\n"));
        assert!(text.contains("two\n"));
    }

    #[test]
    fn test_missing_program() {
        let err = ChildProcess::spawn(&Invocation::new("/definitely/not/here"))
            .err()
            .unwrap();
        assert!(matches!(err, SpawnError::NotFound(_)));
    }

    #[test]
    fn test_terminate() {
        let mut process = ChildProcess::spawn(&sh("sleep 30")).unwrap();
        assert!(process.poll_exit().is_none());
        process.terminate();
        assert!(!process.poll_exit().unwrap().success());
    }
}
