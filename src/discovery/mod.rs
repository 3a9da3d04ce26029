//! Test discovery
//!
//! Asks the target binary for its catalog and narrows it with a wildcard
//! filter before anything is scheduled.

mod filter;
mod list;

pub use filter::TestFilter;
pub use list::{is_disabled, parse_test_list, ALSO_RUN_DISABLED_FLAG};

use std::process::Stdio;
use thiserror::Error;
use tracing::{debug, info};

use crate::executor::CommandTemplate;
use crate::models::TestId;
use crate::process::{ExitState, SpawnError};

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to list tests: {0}")]
    Launch(#[from] SpawnError),

    #[error("Listing tests failed with {status}: {stderr}")]
    ListFailed { status: ExitState, stderr: String },

    #[error("Invalid filter pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Run the binary with `--gtest_list_tests` and return its ids in listing
/// order.
///
/// Disabled tests are listed by the binary but never run, so they are left
/// out unless the template already passes `--gtest_also_run_disabled_tests`.
pub fn discover(template: &CommandTemplate) -> Result<Vec<TestId>, DiscoveryError> {
    let invocation = template.list();
    debug!("Listing tests: {}", invocation);

    let output = invocation
        .to_command()
        .stdin(Stdio::null())
        .output()
        .map_err(|source| SpawnError::from_io(&invocation.program, source))?;

    let status = ExitState::from(output.status);
    if !status.success() {
        return Err(DiscoveryError::ListFailed {
            status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let mut ids = parse_test_list(&String::from_utf8_lossy(&output.stdout));
    if !template.has_arg(ALSO_RUN_DISABLED_FLAG) {
        let listed = ids.len();
        ids.retain(|id| !is_disabled(id));
        if ids.len() < listed {
            debug!("Skipping {} disabled tests", listed - ids.len());
        }
    }
    info!("Discovered {} tests in {}", ids.len(), invocation.program.display());
    Ok(ids)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn lister(dir: &TempDir, body: &str) -> CommandTemplate {
        let script = dir.path().join("list.sh");
        fs::write(&script, body).unwrap();
        CommandTemplate::new("/bin/sh").with_args([script.display().to_string()])
    }

    #[test]
    fn test_discover() {
        let dir = TempDir::new().unwrap();
        let template = lister(
            &dir,
            "[ \"$1\" = --gtest_list_tests ] || exit 9\nprintf 'Math.\\n  Add\\n  Div\\nIo.\\n  Read\\n'\n",
        );
        let ids = discover(&template).unwrap();
        let names: Vec<&str> = ids.iter().map(TestId::as_str).collect();
        assert_eq!(names, vec!["Math.Add", "Math.Div", "Io.Read"]);
    }

    const WITH_DISABLED: &str = "\
if [ \"$1\" = --gtest_list_tests ] || [ \"$2\" = --gtest_list_tests ]; then
  printf 'S.\\n  Good\\n  DISABLED_Off\\n'
  exit 0
fi
echo '[ RUN      ] S.Good'
echo '[       OK ] S.Good (0 ms)'
";

    #[test]
    fn test_discover_skips_disabled() {
        let dir = TempDir::new().unwrap();
        let template = lister(&dir, WITH_DISABLED);
        let ids = discover(&template).unwrap();
        assert_eq!(ids, vec![TestId::from("S.Good")]);

        let template = template.with_args([ALSO_RUN_DISABLED_FLAG]);
        let ids = discover(&template).unwrap();
        assert_eq!(ids, vec![TestId::from("S.Good"), TestId::from("S.DISABLED_Off")]);
    }

    #[test]
    fn test_disabled_tests_do_not_fail_run() {
        use crate::executor::{BatchRunner, Scheduler};
        use crate::models::Verdict;
        use crate::process::ChildLauncher;
        use crate::results::ResultSink;
        use std::sync::Arc;

        let dir = TempDir::new().unwrap();
        let template = lister(&dir, WITH_DISABLED);
        let ids = discover(&template).unwrap();

        let runner = BatchRunner::new(Arc::new(ChildLauncher::new()), template);
        let sink = Arc::new(ResultSink::new(ids.len()));
        let report = Scheduler::new(runner, 2).run(ids, sink).unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.count(Verdict::Passed), 1);
        assert!(report.all_succeeded());
    }

    #[test]
    fn test_discover_failure() {
        let dir = TempDir::new().unwrap();
        let template = lister(&dir, "echo broken >&2\nexit 2\n");
        match discover(&template) {
            Err(DiscoveryError::ListFailed { status, stderr }) => {
                assert_eq!(status, ExitState::Code(2));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_discover_missing_binary() {
        let template = CommandTemplate::new("/nonexistent/gtest-binary");
        assert!(matches!(
            discover(&template),
            Err(DiscoveryError::Launch(SpawnError::NotFound(_)))
        ));
    }
}
