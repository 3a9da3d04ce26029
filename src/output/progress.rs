//! Progress reporting
//!
//! Shows `completed/total` on stderr while a run is in flight: an indicatif
//! bar on a terminal, a plain carriage-return counter otherwise.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use crate::models::RunState;

pub enum ProgressReporter {
    Bar(ProgressBar),
    Plain { last: Option<RunState> },
    Hidden,
}

impl ProgressReporter {
    /// Pick a reporter for stderr. `enabled == false` reports nothing.
    pub fn new(total: usize, enabled: bool) -> Self {
        if !enabled {
            ProgressReporter::Hidden
        } else if io::stderr().is_terminal() {
            ProgressReporter::bar(total)
        } else {
            ProgressReporter::Plain { last: None }
        }
    }

    pub fn bar(total: usize) -> Self {
        let bar = ProgressBar::with_draw_target(
            Some(total as u64),
            ProgressDrawTarget::stderr_with_hz(20),
        );
        let width = total.to_string().len();
        let template = format!(
            "{{prefix:>8}} [{{elapsed_precise}}] {{wide_bar}} {{pos:>{width}}}/{{len:{width}}}"
        );
        bar.set_style(
            ProgressStyle::default_bar()
                .template(&template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_prefix("Running");
        bar.enable_steady_tick(Duration::from_millis(100));
        ProgressReporter::Bar(bar)
    }

    pub fn update(&mut self, state: RunState) {
        match self {
            ProgressReporter::Bar(bar) => bar.set_position(state.completed as u64),
            ProgressReporter::Plain { last } => {
                if *last != Some(state) {
                    *last = Some(state);
                    let mut stderr = io::stderr().lock();
                    let _ = write!(stderr, "\rProgress: {state}");
                    let _ = stderr.flush();
                }
            }
            ProgressReporter::Hidden => {}
        }
    }

    pub fn finish(self) {
        match self {
            ProgressReporter::Bar(bar) => bar.finish_and_clear(),
            ProgressReporter::Plain { last: Some(_) } => eprintln!(),
            ProgressReporter::Plain { last: None } | ProgressReporter::Hidden => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_when_disabled() {
        assert!(matches!(
            ProgressReporter::new(10, false),
            ProgressReporter::Hidden
        ));
    }

    #[test]
    fn test_plain_tracks_last_state() {
        let mut reporter = ProgressReporter::Plain { last: None };
        let state = RunState {
            completed: 3,
            total: 10,
        };
        reporter.update(state);
        match &reporter {
            ProgressReporter::Plain { last } => assert_eq!(*last, Some(state)),
            _ => panic!("Expected plain reporter"),
        }
        reporter.finish();
    }

    #[test]
    fn test_bar_position() {
        let mut reporter = ProgressReporter::bar(5);
        reporter.update(RunState {
            completed: 2,
            total: 5,
        });
        if let ProgressReporter::Bar(bar) = &reporter {
            assert_eq!(bar.position(), 2);
            assert_eq!(bar.length(), Some(5));
        }
        reporter.finish();
    }
}
