//! Commit, merge and range types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reader::DiffSummary;

/// Represents a parsed git commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// The commit SHA (40 hex characters)
    pub sha: String,
    /// Commit message
    pub message: String,
    /// Author name
    pub author: String,
    /// Author email
    pub author_email: String,
    /// Commit timestamp
    pub timestamp: DateTime<Utc>,
    /// Parent commit SHAs
    pub parents: Vec<String>,
}

impl Commit {
    /// Get the short SHA (first 7 characters)
    #[must_use]
    pub fn short_sha(&self) -> &str {
        &self.sha[..7.min(self.sha.len())]
    }

    /// Range from the first parent to this commit: everything it introduced
    ///
    /// A root commit gets an empty base.
    #[must_use]
    pub fn first_parent_range(&self) -> CommitRange {
        let base = self.parents.first().cloned().unwrap_or_default();
        CommitRange::new(base, self.sha.clone())
    }

    /// Get the first line of the commit message (subject)
    #[must_use]
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// Message body after the subject line, trimmed
    #[must_use]
    pub fn body(&self) -> &str {
        match self.message.split_once('\n') {
            Some((_, rest)) => rest.trim(),
            None => "",
        }
    }
}

/// A `base..head` commit range: commits reachable from `head` but not `base`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitRange {
    /// Exclusive lower end
    pub base: String,
    /// Inclusive upper end
    pub head: String,
}

impl CommitRange {
    /// Create a range from two revisions
    #[must_use]
    pub fn new(base: impl Into<String>, head: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            head: head.into(),
        }
    }
}

impl std::fmt::Display for CommitRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.base, self.head)
    }
}

/// A merge commit together with the commits it brought in
///
/// Read once per analysis run and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeEvent {
    /// The merge commit itself (identity, parents, author, timestamp)
    #[serde(flatten)]
    pub merge: Commit,
    /// Commits unique to the merged-in side, oldest first
    pub subsumed: Vec<Commit>,
    /// Statistics of the first-parent diff
    pub diff: DiffSummary,
    /// Stat header followed by the first-parent patch
    pub diff_text: String,
}

impl MergeEvent {
    /// The merge commit SHA
    #[must_use]
    pub fn sha(&self) -> &str {
        &self.merge.sha
    }

    /// The merge timestamp
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.merge.timestamp
    }

    /// Subject line of the merge message
    #[must_use]
    pub fn subject(&self) -> &str {
        self.merge.subject()
    }

    /// Subsumed commits whose author satisfies `keep`, oldest first
    pub fn subsumed_by<F>(&self, mut keep: F) -> Vec<&Commit>
    where
        F: FnMut(&Commit) -> bool,
    {
        self.subsumed.iter().filter(|c| keep(c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use similar_asserts::assert_eq;

    fn sample_commit() -> Commit {
        Commit {
            sha: "1945ab9c752534e733c38ba0109dc3b741f0a6eb".to_string(),
            message: "feat(scoring): add rubric\n\nDetailed description here.".to_string(),
            author: "alice".to_string(),
            author_email: "alice@example.com".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 17, 2, 33, 6).unwrap(),
            parents: vec!["c460aeb7fb2d109c17e43de0ce681faec0b7374d".to_string()],
        }
    }

    fn sample_merge() -> MergeEvent {
        let mut merge = sample_commit();
        merge.sha = "a".repeat(40);
        merge.message = "Merge branch 'feature'".to_string();
        merge.parents = vec!["b".repeat(40), "c".repeat(40)];

        let mut by_bob = sample_commit();
        by_bob.sha = "d".repeat(40);
        by_bob.author = "bob".to_string();

        MergeEvent {
            merge,
            subsumed: vec![sample_commit(), by_bob],
            diff: DiffSummary::empty(),
            diff_text: String::new(),
        }
    }

    #[test]
    fn test_short_sha() {
        let commit = sample_commit();
        assert_eq!(commit.short_sha(), "1945ab9");
    }

    #[test]
    fn test_short_sha_handles_short_input() {
        let mut commit = sample_commit();
        commit.sha = "abc".to_string();
        assert_eq!(commit.short_sha(), "abc");
    }

    #[test]
    fn test_subject_and_body() {
        let commit = sample_commit();
        assert_eq!(commit.subject(), "feat(scoring): add rubric");
        assert_eq!(commit.body(), "Detailed description here.");
    }

    #[test]
    fn test_body_empty_for_single_line_message() {
        let mut commit = sample_commit();
        commit.message = "Simple message".to_string();
        assert_eq!(commit.body(), "");
    }

    #[test]
    fn test_commit_range_display() {
        let range = CommitRange::new("abc", "def");
        assert_eq!(range.to_string(), "abc..def");
    }

    #[test]
    fn test_first_parent_range() {
        let merge = sample_merge();
        let range = merge.merge.first_parent_range();
        assert_eq!(range.base, "b".repeat(40));
        assert_eq!(range.head, "a".repeat(40));

        let mut root = sample_commit();
        root.parents.clear();
        assert_eq!(root.first_parent_range().base, "");
    }

    #[test]
    fn test_subsumed_by_filters_authors() {
        let merge = sample_merge();
        let bobs = merge.subsumed_by(|c| c.author == "bob");
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].sha, "d".repeat(40));
    }

    #[test]
    fn test_merge_event_json_is_flattened() {
        let merge = sample_merge();
        let json = serde_json::to_value(&merge).expect("serialize");
        assert_eq!(json["sha"], serde_json::json!("a".repeat(40)));
        assert!(json["subsumed"].is_array());
    }
}
