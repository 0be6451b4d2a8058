// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for mergescore-git

use thiserror::Error;

/// Errors that can occur while reading merges from a repository
#[derive(Debug, Error)]
pub enum GitError {
    /// Error from git2 library
    #[error("Git error: {0}")]
    Git2(#[from] git2::Error),

    /// The path has no version-control metadata
    #[error("Not a git repository: {path}")]
    NotARepository {
        /// The path that was opened
        path: String,
    },

    /// Invalid commit reference (branch, tag, or SHA)
    #[error("Invalid commit reference: {reference}")]
    InvalidReference {
        /// The reference string that could not be resolved
        reference: String,
    },

    /// The commit exists but is not a merge
    #[error("Commit {sha} is not a merge (it has {parents} parent(s))")]
    NotAMerge {
        /// The commit SHA
        sha: String,
        /// Number of parents the commit has
        parents: usize,
    },
}
