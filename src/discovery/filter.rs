//! Wildcard test filter
//!
//! `:`-separated patterns where `*` matches any run of characters and `?`
//! exactly one. Matching is anchored and case-insensitive.

use globset::GlobBuilder;
use regex::bytes::Regex;
use std::fmt;

use super::DiscoveryError;
use crate::executor::FILTER_SEPARATOR;
use crate::models::TestId;

#[derive(Clone, Debug)]
struct Pattern {
    text: String,
    regex: Regex,
}

impl Pattern {
    fn new(text: &str) -> Result<Self, DiscoveryError> {
        let invalid = |reason: String| DiscoveryError::InvalidPattern {
            pattern: text.to_string(),
            reason,
        };
        // globset has path semantics, so match with its regex instead.
        let glob = GlobBuilder::new(text)
            .case_insensitive(true)
            .backslash_escape(false)
            .literal_separator(false)
            .build()
            .map_err(|e| invalid(e.to_string()))?;
        let regex = Regex::new(glob.regex()).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            text: text.to_string(),
            regex,
        })
    }
}

/// Set of wildcard patterns; a test is selected when any pattern matches
#[derive(Clone, Debug)]
pub struct TestFilter {
    patterns: Vec<Pattern>,
}

impl TestFilter {
    /// Parse a filter expression. An empty expression selects everything.
    pub fn parse(expr: &str) -> Result<Self, DiscoveryError> {
        let mut patterns = expr
            .split(FILTER_SEPARATOR)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Pattern::new)
            .collect::<Result<Vec<_>, _>>()?;
        if patterns.is_empty() {
            patterns.push(Pattern::new("*")?);
        }
        Ok(Self { patterns })
    }

    pub fn matches(&self, id: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.regex.is_match(id.as_bytes()))
    }

    /// Keep the selected ids, preserving order
    pub fn apply(&self, ids: Vec<TestId>) -> Vec<TestId> {
        ids.into_iter().filter(|id| self.matches(id.as_str())).collect()
    }
}

impl fmt::Display for TestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, pattern) in self.patterns.iter().enumerate() {
            if idx > 0 {
                write!(f, "{FILTER_SEPARATOR}")?;
            }
            f.write_str(&pattern.text)?;
        }
        Ok(())
    }
}
