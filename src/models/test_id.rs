//! Test identifiers and batches

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

/// Globally unique name of one test case, `<suite>.<case>` by convention.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestId(String);

impl TestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Suite part of the identifier (everything before the last `.`)
    pub fn suite(&self) -> &str {
        match self.0.rfind('.') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for TestId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Ordered, duplicate-free list of tests requested from one process invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Batch {
    ids: Vec<TestId>,
}

impl Batch {
    /// Build a batch, dropping repeated ids while keeping first-seen order.
    pub fn new(ids: impl IntoIterator<Item = TestId>) -> Self {
        let mut seen = HashSet::new();
        let ids = ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Self { ids }
    }

    pub fn ids(&self) -> &[TestId] {
        &self.ids
    }

    pub fn into_ids(self) -> Vec<TestId> {
        self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Split into contiguous chunks of at most `size` ids.
    pub fn chunks(self, size: usize) -> Vec<Batch> {
        let size = size.max(1);
        self.ids
            .chunks(size)
            .map(|chunk| Batch { ids: chunk.to_vec() })
            .collect()
    }

    /// One batch per id.
    pub fn singletons(self) -> Vec<Batch> {
        self.chunks(1)
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ids.as_slice() {
            [] => write!(f, "[]"),
            [only] => write!(f, "[{only}]"),
            [first, rest @ ..] => write!(f, "[{first} +{}]", rest.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<TestId> {
        names.iter().map(|n| TestId::from(*n)).collect()
    }

    #[test]
    fn test_batch_dedup_keeps_order() {
        let batch = Batch::new(ids(&["B.x", "A.y", "B.x", "C.z"]));
        assert_eq!(batch.ids(), ids(&["B.x", "A.y", "C.z"]).as_slice());
    }

    #[test]
    fn test_batch_chunks() {
        let chunks = Batch::new(ids(&["a.1", "a.2", "a.3", "a.4", "a.5"])).chunks(2);
        let sizes: Vec<_> = chunks.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(chunks[2].ids(), ids(&["a.5"]).as_slice());
    }

    #[test]
    fn test_chunk_size_zero_is_clamped() {
        let chunks = Batch::new(ids(&["a.1", "a.2"])).chunks(0);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_suite() {
        assert_eq!(TestId::from("Foo/Param.Bar/3").suite(), "Foo/Param");
        assert_eq!(TestId::from("NoDot").suite(), "");
    }

    #[test]
    fn test_batch_display() {
        assert_eq!(Batch::new(ids(&["A.a"])).to_string(), "[A.a]");
        assert_eq!(Batch::new(ids(&["A.a", "A.b", "A.c"])).to_string(), "[A.a +2]");
    }
}
