// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Repository reader
//!
//! This module discovers merge commits in a repository using the `git2`
//! crate, works out which commits each merge brought in, and renders the
//! diff text that gets summarized for scoring.

use crate::commit::{Commit, CommitRange, MergeEvent};
use crate::error::GitError;
use chrono::{DateTime, TimeZone, Utc};
use git2::{
    DiffFormat, DiffOptions, DiffStatsFormat, ErrorCode, Oid, Patch, Repository, Revwalk, Sort,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Width used when rendering the `--stat` style header
const STAT_WIDTH: usize = 80;

/// Which merges to list
#[derive(Debug, Clone, Default)]
pub struct MergeQuery {
    /// Only include merges at or after this time
    pub since: Option<DateTime<Utc>>,
    /// Only include merges at or before this time
    pub until: Option<DateTime<Utc>>,
}

impl MergeQuery {
    /// Merges committed at or after `date`
    #[must_use]
    pub fn since(date: DateTime<Utc>) -> Self {
        Self {
            since: Some(date),
            ..Default::default()
        }
    }

    /// Filter merges until a date
    #[must_use]
    pub fn until(mut self, date: DateTime<Utc>) -> Self {
        self.until = Some(date);
        self
    }

    fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.since.is_none_or(|since| timestamp >= since)
            && self.until.is_none_or(|until| timestamp <= until)
    }
}

/// Represents file changes in a diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    /// Path to the file
    pub path: String,
    /// Change status: "added", "modified", "deleted", "renamed"
    pub status: String,
    /// Number of lines added
    pub insertions: usize,
    /// Number of lines deleted
    pub deletions: usize,
}

/// Summary of all changes in a diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Number of files changed
    pub files_changed: usize,
    /// Total lines added
    pub insertions: usize,
    /// Total lines deleted
    pub deletions: usize,
    /// Per-file changes
    pub files: Vec<FileDiff>,
}

impl DiffSummary {
    /// Create an empty diff summary
    #[must_use]
    pub fn empty() -> Self {
        Self {
            files_changed: 0,
            insertions: 0,
            deletions: 0,
            files: Vec::new(),
        }
    }
}

/// A git repository wrapper for reading merges
pub struct GitRepo {
    repo: Repository,
}

impl GitRepo {
    /// Open a git repository at the given path
    ///
    /// # Errors
    ///
    /// Returns `GitError::NotARepository` if the path has no git metadata.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GitError> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|_| GitError::NotARepository {
            path: path.display().to_string(),
        })?;
        Ok(Self { repo })
    }

    /// Get the repository path (the `.git` directory)
    #[must_use]
    pub fn path(&self) -> &Path {
        self.repo.path()
    }

    /// Get the working directory path (None for bare repos)
    #[must_use]
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    /// List merges matching `query`, ordered by timestamp then SHA (ascending)
    ///
    /// An empty repository, or a window without merges, yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns `GitError` if the history cannot be walked.
    pub fn list_merges(&self, query: &MergeQuery) -> Result<Vec<MergeEvent>, GitError> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TIME)?;

        if !self.push_head(&mut revwalk)? {
            debug!("HEAD is unborn, no merges to list");
            return Ok(Vec::new());
        }

        let mut merges = Vec::new();
        for oid_result in revwalk {
            let git_commit = self.repo.find_commit(oid_result?)?;
            if git_commit.parent_count() < 2 {
                continue;
            }
            let timestamp = to_utc(git_commit.time());
            if !query.contains(timestamp) {
                continue;
            }
            merges.push(self.read_merge(&git_commit, timestamp)?);
        }

        merges.sort_by(|a, b| {
            a.timestamp()
                .cmp(&b.timestamp())
                .then_with(|| a.sha().cmp(b.sha()))
        });

        debug!(count = merges.len(), "Listed merges");
        Ok(merges)
    }

    /// Read a single merge by SHA or reference
    ///
    /// # Errors
    ///
    /// Returns `GitError::InvalidReference` if the reference cannot be resolved
    /// and `GitError::NotAMerge` if the commit has fewer than two parents.
    pub fn get_merge(&self, reference: &str) -> Result<MergeEvent, GitError> {
        let git_commit = self.resolve(reference)?;
        if git_commit.parent_count() < 2 {
            return Err(GitError::NotAMerge {
                sha: git_commit.id().to_string(),
                parents: git_commit.parent_count(),
            });
        }
        let timestamp = to_utc(git_commit.time());
        self.read_merge(&git_commit, timestamp)
    }

    /// Commits reachable from the merge's second (and later) parents but not
    /// from its first parent, oldest first
    ///
    /// # Errors
    ///
    /// Returns `GitError` if a parent SHA is invalid or the walk fails.
    pub fn subsumed_commits(&self, merge: &Commit) -> Result<Vec<Commit>, GitError> {
        let Some((first, merged_in)) = merge.parents.split_first() else {
            return Ok(Vec::new());
        };
        if merged_in.is_empty() {
            return Ok(Vec::new());
        }

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME | Sort::REVERSE)?;
        for parent in merged_in {
            revwalk.push(Oid::from_str(parent)?)?;
        }
        revwalk.hide(Oid::from_str(first)?)?;

        let mut commits = Vec::new();
        for oid_result in revwalk {
            let git_commit = self.repo.find_commit(oid_result?)?;
            let timestamp = to_utc(git_commit.time());
            commits.push(extract_commit(&git_commit, timestamp));
        }
        Ok(commits)
    }

    /// Render the stat header and patch for `range`
    ///
    /// An empty `range.base` diffs against the empty tree.
    ///
    /// # Errors
    ///
    /// Returns `GitError` if either end cannot be resolved.
    pub fn diff_text(&self, range: &CommitRange) -> Result<String, GitError> {
        let diff = self.range_diff(range)?;

        let mut text = String::new();
        let stats = diff.stats()?;
        let buf = stats.to_buf(DiffStatsFormat::FULL, STAT_WIDTH)?;
        text.push_str(buf.as_str().unwrap_or_default());
        if !text.is_empty() {
            text.push('\n');
        }

        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                text.push(line.origin());
            }
            text.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;

        Ok(text)
    }

    /// Summarize the changes in `range`
    ///
    /// # Errors
    ///
    /// Returns `GitError` if either end cannot be resolved.
    pub fn diff_summary(&self, range: &CommitRange) -> Result<DiffSummary, GitError> {
        let diff = self.range_diff(range)?;
        let stats = diff.stats()?;

        let mut files = Vec::new();
        for (idx, delta) in diff.deltas().enumerate() {
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<unknown>".to_string());

            let status = match delta.status() {
                git2::Delta::Added => "added",
                git2::Delta::Deleted => "deleted",
                git2::Delta::Modified => "modified",
                git2::Delta::Renamed => "renamed",
                git2::Delta::Copied => "copied",
                _ => "unknown",
            }
            .to_string();

            // Binary files have no patch
            let (insertions, deletions) = match Patch::from_diff(&diff, idx)? {
                Some(patch) => {
                    let (_, added, deleted) = patch.line_stats()?;
                    (added, deleted)
                }
                None => (0, 0),
            };

            files.push(FileDiff {
                path,
                status,
                insertions,
                deletions,
            });
        }

        Ok(DiffSummary {
            files_changed: stats.files_changed(),
            insertions: stats.insertions(),
            deletions: stats.deletions(),
            files,
        })
    }

    /// First-parent diff of a commit, cut to `max_lines` for display
    ///
    /// # Errors
    ///
    /// Returns `GitError::InvalidReference` if the reference cannot be resolved.
    pub fn display_diff(&self, reference: &str, max_lines: usize) -> Result<String, GitError> {
        let git_commit = self.resolve(reference)?;
        let base = git_commit
            .parent_ids()
            .next()
            .map(|oid| oid.to_string())
            .unwrap_or_default();
        let range = CommitRange::new(base, git_commit.id().to_string());
        Ok(truncate_lines(&self.diff_text(&range)?, max_lines))
    }

    /// Push HEAD onto the walk; false when HEAD is unborn
    fn push_head(&self, revwalk: &mut Revwalk<'_>) -> Result<bool, GitError> {
        match self.repo.head() {
            Ok(_) => {
                revwalk.push_head()?;
                Ok(true)
            }
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn resolve(&self, reference: &str) -> Result<git2::Commit<'_>, GitError> {
        self.repo
            .revparse_single(reference)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|_| GitError::InvalidReference {
                reference: reference.to_string(),
            })
    }

    fn read_merge(
        &self,
        git_commit: &git2::Commit<'_>,
        timestamp: DateTime<Utc>,
    ) -> Result<MergeEvent, GitError> {
        let merge = extract_commit(git_commit, timestamp);
        let subsumed = self.subsumed_commits(&merge)?;

        let range = merge.first_parent_range();
        let diff = self.diff_summary(&range)?;
        let diff_text = self.diff_text(&range)?;

        debug!(
            merge = %merge.short_sha(),
            subsumed = subsumed.len(),
            files = diff.files_changed,
            "Read merge"
        );

        Ok(MergeEvent {
            merge,
            subsumed,
            diff,
            diff_text,
        })
    }

    fn range_diff(&self, range: &CommitRange) -> Result<git2::Diff<'_>, GitError> {
        let head_tree = self.resolve(&range.head)?.tree()?;
        let base_tree = if range.base.is_empty() {
            None
        } else {
            Some(self.resolve(&range.base)?.tree()?)
        };

        let mut opts = DiffOptions::new();
        opts.ignore_whitespace(false);

        Ok(self
            .repo
            .diff_tree_to_tree(base_tree.as_ref(), Some(&head_tree), Some(&mut opts))?)
    }
}

/// Extract commit metadata from a git2 commit
fn extract_commit(git_commit: &git2::Commit<'_>, timestamp: DateTime<Utc>) -> Commit {
    Commit {
        sha: git_commit.id().to_string(),
        message: git_commit.message().unwrap_or("").to_string(),
        author: git_commit.author().name().unwrap_or("Unknown").to_string(),
        author_email: git_commit.author().email().unwrap_or("").to_string(),
        timestamp,
        parents: git_commit.parent_ids().map(|p| p.to_string()).collect(),
    }
}

fn to_utc(time: git2::Time) -> DateTime<Utc> {
    Utc.timestamp_opt(time.seconds(), 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Keep the first `max_lines` lines of `text`, marking the cut
#[must_use]
pub fn truncate_lines(text: &str, max_lines: usize) -> String {
    let total = text.lines().count();
    if total <= max_lines {
        return text.to_string();
    }
    let mut kept: Vec<&str> = text.lines().take(max_lines).collect();
    let marker = format!("\n... (diff truncated after {max_lines} lines) ...");
    kept.push(&marker);
    kept.join("\n")
}
