//! Incremental output parsing
//!
//! Turns the raw byte stream of a test binary into marker events. Bytes may
//! arrive split at arbitrary points, so an incomplete trailing line is kept
//! until its newline shows up.

use serde::{Deserialize, Serialize};

use crate::models::{TestId, Verdict};

/// Substrings that identify progress lines in the binary's output
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerSet {
    pub run: String,
    pub ok: String,
    pub failed: String,
    pub skipped: String,
}

impl Default for MarkerSet {
    fn default() -> Self {
        Self {
            run: "[ RUN      ]".to_string(),
            ok: "[       OK ]".to_string(),
            failed: "[  FAILED  ]".to_string(),
            skipped: "[  SKIPPED ]".to_string(),
        }
    }
}

impl MarkerSet {
    pub fn is_valid(&self) -> bool {
        [&self.run, &self.ok, &self.failed, &self.skipped]
            .iter()
            .all(|m| !m.trim().is_empty())
    }

    /// Classify one line of output
    pub fn parse_line(&self, line: &str) -> Option<Marker> {
        if let Some(rest) = after(line, &self.run) {
            return first_token(rest).map(Marker::Start);
        }
        if let Some(rest) = after(line, &self.ok) {
            return Some(Marker::End(first_token(rest), Verdict::Passed));
        }
        if let Some(rest) = after(line, &self.failed) {
            return Some(Marker::End(first_token(rest), Verdict::Failed));
        }
        if let Some(rest) = after(line, &self.skipped) {
            return Some(Marker::End(first_token(rest), Verdict::Skipped));
        }
        None
    }
}

fn after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.find(marker).map(|idx| &line[idx + marker.len()..])
}

// GoogleTest appends "(12 ms)" or ", where GetParam() = ..." after the name.
fn first_token(rest: &str) -> Option<TestId> {
    rest.split_whitespace()
        .next()
        .map(|token| token.trim_end_matches(','))
        .filter(|token| !token.is_empty())
        .map(TestId::from)
}

/// A recognised progress line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Marker {
    /// A test began executing
    Start(TestId),
    /// A test finished; `None` refers to whichever test is running
    End(Option<TestId>, Verdict),
}

/// Line assembly plus marker classification
#[derive(Debug)]
pub struct OutputParser {
    markers: MarkerSet,
    pending: Vec<u8>,
}

impl OutputParser {
    pub fn new(markers: MarkerSet) -> Self {
        Self {
            markers,
            pending: Vec::new(),
        }
    }

    /// Consume newly arrived bytes, returning markers from completed lines.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Marker> {
        self.pending.extend_from_slice(bytes);
        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };
        let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
        self.parse_lines(&complete)
    }

    /// Flush a trailing line that never got its newline.
    pub fn finish(&mut self) -> Vec<Marker> {
        let rest = std::mem::take(&mut self.pending);
        self.parse_lines(&rest)
    }

    fn parse_lines(&self, bytes: &[u8]) -> Vec<Marker> {
        String::from_utf8_lossy(bytes)
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter_map(|line| self.markers.parse_line(line))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> OutputParser {
        OutputParser::new(MarkerSet::default())
    }

    #[test]
    fn test_parse_gtest_lines() {
        let markers = MarkerSet::default();
        assert_eq!(
            markers.parse_line("[ RUN      ] Foo.Bar"),
            Some(Marker::Start("Foo.Bar".into()))
        );
        assert_eq!(
            markers.parse_line("[       OK ] Foo.Bar (12 ms)"),
            Some(Marker::End(Some("Foo.Bar".into()), Verdict::Passed))
        );
        assert_eq!(
            markers.parse_line("[  FAILED  ] Inst/Foo.Bar/1, where GetParam() = 4 (0 ms)"),
            Some(Marker::End(Some("Inst/Foo.Bar/1".into()), Verdict::Failed))
        );
        assert_eq!(
            markers.parse_line("[  SKIPPED ] Foo.Skip (0 ms)"),
            Some(Marker::End(Some("Foo.Skip".into()), Verdict::Skipped))
        );
        assert_eq!(markers.parse_line("[----------] 3 tests from Foo"), None);
        assert_eq!(markers.parse_line("some test chatter"), None);
    }

    #[test]
    fn test_marker_without_name() {
        let markers = MarkerSet::default();
        assert_eq!(
            markers.parse_line("[  FAILED  ]"),
            Some(Marker::End(None, Verdict::Failed))
        );
        assert_eq!(markers.parse_line("[ RUN      ]   "), None);
    }

    #[test]
    fn test_split_chunks() {
        let mut parser = parser();
        assert!(parser.feed(b"[ RUN    ").is_empty());
        assert!(parser.feed(b"  ] Foo.B").is_empty());
        assert_eq!(
            parser.feed(b"ar\r\n[       OK ] Foo.Bar (1 ms)\n[ RUN      ] Foo.Baz"),
            vec![
                Marker::Start("Foo.Bar".into()),
                Marker::End(Some("Foo.Bar".into()), Verdict::Passed),
            ]
        );
        assert_eq!(parser.finish(), vec![Marker::Start("Foo.Baz".into())]);
        assert!(parser.finish().is_empty());
    }

    #[test]
    fn test_custom_markers() {
        let markers = MarkerSet {
            run: "START".to_string(),
            ok: "PASS".to_string(),
            failed: "FAIL".to_string(),
            skipped: "SKIP".to_string(),
        };
        assert!(markers.is_valid());
        assert_eq!(markers.parse_line("START a.b"), Some(Marker::Start("a.b".into())));
        assert_eq!(
            markers.parse_line(">> FAIL a.b"),
            Some(Marker::End(Some("a.b".into()), Verdict::Failed))
        );

        let empty = MarkerSet {
            run: " ".to_string(),
            ..MarkerSet::default()
        };
        assert!(!empty.is_valid());
    }
}
