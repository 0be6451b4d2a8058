//! Turning a discovered merge into a scoring request
//!
//! Applies the author filter to the subsumed commits, derives the timing
//! figures, and renders the prompt whose text also feeds the fingerprint.

use chrono::{DateTime, Utc};
use mergescore_git::{Commit, MergeEvent, truncate_lines};
use mergescore_llm::{CommitLine, MergeContext, Prompt};

use crate::authors::AuthorFilter;

/// A merge that passed author filtering, ready to fingerprint and score
#[derive(Debug, Clone)]
pub struct PreparedMerge<'a> {
    /// The merge as read from the repository
    pub merge: &'a MergeEvent,
    /// Subsumed commits by configured authors, oldest first
    pub commits: Vec<&'a Commit>,
    /// Author of the first filtered commit
    pub primary_author: String,
    /// First to last filtered commit, in hours
    pub development_hours: f64,
    /// Last filtered commit to the merge, in hours; never negative
    pub review_hours: f64,
    /// Rendered request
    pub prompt: Prompt,
}

impl PreparedMerge<'_> {
    /// SHAs of the filtered commits, oldest first
    #[must_use]
    pub fn commit_shas(&self) -> Vec<String> {
        self.commits.iter().map(|c| c.sha.clone()).collect()
    }
}

/// Filter and render `merge`; `None` when no subsumed commit matches `authors`
///
/// A `max_diff_lines` of zero leaves the diff out of the prompt.
#[must_use]
pub fn prepare<'a>(
    merge: &'a MergeEvent,
    authors: &AuthorFilter,
    max_diff_lines: usize,
) -> Option<PreparedMerge<'a>> {
    let commits = merge.subsumed_by(|c| authors.matches(c));
    let first = commits.first()?;
    let last = commits.last()?;

    let primary_author = first.author.clone();
    let development_hours = hours_between(first.timestamp, last.timestamp);
    let review_hours = hours_between(last.timestamp, merge.timestamp()).max(0.0);

    let diff = (max_diff_lines > 0).then(|| truncate_lines(&merge.diff_text, max_diff_lines));

    let context = MergeContext {
        subject: merge.subject().to_string(),
        message: merge.merge.message.clone(),
        primary_author: primary_author.clone(),
        commits: commits
            .iter()
            .map(|c| CommitLine {
                subject: c.subject().to_string(),
                timestamp: c.timestamp,
            })
            .collect(),
        additions: merge.diff.insertions,
        deletions: merge.diff.deletions,
        files_changed: merge.diff.files_changed,
        development_hours,
        review_hours,
        merged_at: merge.timestamp(),
        diff,
    };

    Some(PreparedMerge {
        merge,
        commits,
        primary_author,
        development_hours,
        review_hours,
        prompt: Prompt::for_merge(&context),
    })
}

fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mergescore_git::DiffSummary;
    use similar_asserts::assert_eq;

    fn commit(sha: &str, author: &str, hour: u32, subject: &str) -> Commit {
        Commit {
            sha: sha.repeat(40),
            message: format!("{subject}\n"),
            author: author.to_string(),
            author_email: format!("{author}@example.com"),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap(),
            parents: vec![],
        }
    }

    fn merge() -> MergeEvent {
        let diff_text = (1..=10)
            .map(|i| format!("+line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        MergeEvent {
            merge: Commit {
                sha: "m".repeat(40),
                message: "Merge branch 'feature'\n\nAdds the feature".to_string(),
                author: "maintainer".to_string(),
                author_email: "maintainer@example.com".to_string(),
                timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
                parents: vec!["1".repeat(40), "2".repeat(40)],
            },
            subsumed: vec![
                commit("a", "alice", 2, "start feature"),
                commit("b", "bob", 4, "bob helps"),
                commit("c", "alice", 8, "finish feature"),
            ],
            diff: DiffSummary {
                files_changed: 2,
                insertions: 10,
                deletions: 0,
                files: vec![],
            },
            diff_text,
        }
    }

    #[test]
    fn test_filter_leaves_nothing() {
        let m = merge();
        assert!(prepare(&m, &AuthorFilter::only(["carol"]), 500).is_none());
    }

    #[test]
    fn test_timings_follow_filtered_commits() {
        let m = merge();
        let prepared = prepare(&m, &AuthorFilter::only(["bob"]), 500).expect("prepared");

        assert_eq!(prepared.primary_author, "bob");
        assert_eq!(prepared.commits.len(), 1);
        assert_eq!(prepared.development_hours, 0.0);
        assert_eq!(prepared.review_hours, 8.0);
    }

    #[test]
    fn test_any_author_uses_all_commits() {
        let m = merge();
        let prepared = prepare(&m, &AuthorFilter::Any, 500).expect("prepared");

        assert_eq!(prepared.primary_author, "alice");
        assert_eq!(prepared.commit_shas().len(), 3);
        assert_eq!(prepared.development_hours, 6.0);
        assert_eq!(prepared.review_hours, 4.0);
        assert!(prepared.prompt.user.contains("- bob helps (2026-01-01 04:00)"));
        assert!(prepared.prompt.user.contains("Adds the feature"));
    }

    #[test]
    fn test_diff_budget() {
        let m = merge();

        let full = prepare(&m, &AuthorFilter::Any, 500).expect("prepared");
        assert!(full.prompt.user.contains("+line 10"));

        let cut = prepare(&m, &AuthorFilter::Any, 3).expect("prepared");
        assert!(cut.prompt.user.contains("+line 3"));
        assert!(!cut.prompt.user.contains("+line 4"));
        assert!(cut.prompt.user.contains("diff truncated after 3 lines"));

        let none = prepare(&m, &AuthorFilter::Any, 0).expect("prepared");
        assert!(!none.prompt.user.contains("+line 1"));
    }

    #[test]
    fn test_commit_set_changes_prompt() {
        let m = merge();
        let all = prepare(&m, &AuthorFilter::Any, 500).expect("prepared");
        let alice = prepare(&m, &AuthorFilter::only(["alice"]), 500).expect("prepared");
        assert_ne!(all.prompt, alice.prompt);
    }

    #[test]
    fn test_review_hours_never_negative() {
        let mut m = merge();
        m.subsumed[2].timestamp = Utc.with_ymd_and_hms(2026, 1, 1, 13, 0, 0).unwrap();
        let prepared = prepare(&m, &AuthorFilter::Any, 500).expect("prepared");
        assert_eq!(prepared.review_hours, 0.0);
    }
}
