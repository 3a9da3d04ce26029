//! `--gtest_list_tests` output parsing

use std::collections::HashSet;

use crate::models::TestId;

/// Flag that makes the binary run tests it would otherwise skip as disabled
pub const ALSO_RUN_DISABLED_FLAG: &str = "--gtest_also_run_disabled_tests";

const DISABLED_PREFIX: &str = "DISABLED_";

fn disabled_part(part: &str) -> bool {
    part.starts_with(DISABLED_PREFIX) || part.contains(&format!("/{DISABLED_PREFIX}"))
}

/// Whether the binary skips `id` unless asked to run disabled tests.
///
/// Either the suite or the case name starts with `DISABLED_`, possibly
/// behind a parameterization prefix such as `Instances/DISABLED_Suite`.
pub fn is_disabled(id: &TestId) -> bool {
    let suite = id.suite();
    let case = id
        .as_str()
        .strip_prefix(suite)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(id.as_str());
    disabled_part(suite) || disabled_part(case)
}

fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(head, _)| head).trim_end()
}

/// Turn a suite/case listing into `<suite>.<case>` ids.
///
/// Suite lines are unindented and end in `.`; case lines are indented and
/// belong to the suite above them. Anything before the first suite and
/// repeated ids are dropped.
pub fn parse_test_list(output: &str) -> Vec<TestId> {
    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    let mut suite: Option<&str> = None;

    for raw in output.lines() {
        let line = strip_comment(raw.trim_end_matches('\r'));
        if line.trim().is_empty() {
            continue;
        }

        let indented = line.starts_with(char::is_whitespace);
        if !indented {
            suite = line.strip_suffix('.').filter(|s| !s.is_empty());
            continue;
        }

        if let Some(suite) = suite {
            let id = format!("{suite}.{}", line.trim());
            if seen.insert(id.clone()) {
                ids.push(TestId::new(id));
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(ids: &[TestId]) -> Vec<&str> {
        ids.iter().map(TestId::as_str).collect()
    }

    #[test]
    fn test_parse_basic() {
        let output = "Math.\n  Add\n  Sub\nStrings.\n  Concat\n";
        assert_eq!(
            names(&parse_test_list(output)),
            vec!["Math.Add", "Math.Sub", "Strings.Concat"]
        );
    }

    #[test]
    fn test_parse_parameterized() {
        let output = "\
Running main() from gtest_main.cc
Instances/RangeTest.  # TypeParam = int
  Covers/0  # GetParam() = 1
  Covers/1  # GetParam() = 2
";
        assert_eq!(
            names(&parse_test_list(output)),
            vec!["Instances/RangeTest.Covers/0", "Instances/RangeTest.Covers/1"]
        );
    }

    #[test]
    fn test_parse_crlf_and_duplicates() {
        let output = "Suite.\r\n  a\r\n  a\r\n\r\n  b\r\n";
        assert_eq!(names(&parse_test_list(output)), vec!["Suite.a", "Suite.b"]);
    }

    #[test]
    fn test_disabled_ids() {
        let output = "\
S.
  Good
  DISABLED_Off
DISABLED_Suite.
  Any
Inst/DISABLED_Param.
  Case/0
Inst/Param.
  Case/0
";
        let ids = parse_test_list(output);
        let disabled: Vec<&str> = ids
            .iter()
            .filter(|id| is_disabled(id))
            .map(TestId::as_str)
            .collect();
        assert_eq!(
            disabled,
            vec!["S.DISABLED_Off", "DISABLED_Suite.Any", "Inst/DISABLED_Param.Case/0"]
        );
        assert!(!is_disabled(&TestId::from("S.NOT_DISABLED_Yet")));
    }

    #[test]
    fn test_parse_ignores_orphan_cases() {
        let output = "  stray\nnot a suite line\n  also stray\n";
        assert!(parse_test_list(output).is_empty());
    }
}
