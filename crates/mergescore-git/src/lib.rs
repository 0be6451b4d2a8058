// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! mergescore-git: merge discovery for mergescore
//!
//! This library crate lists the merge commits of a repository, works out the
//! commits each merge brought in (the "pull request"), and renders the diff
//! text that is summarized for scoring.

#![warn(missing_docs)]

//! # Example
//!
//! ```no_run
//! use chrono::{Duration, Utc};
//! use mergescore_git::{GitRepo, MergeQuery};
//!
//! let repo = GitRepo::open(".").expect("open repo");
//! let merges = repo
//!     .list_merges(&MergeQuery::since(Utc::now() - Duration::weeks(2)))
//!     .expect("list merges");
//!
//! for m in merges {
//!     println!("{} - {} ({} commits)", m.merge.short_sha(), m.subject(), m.subsumed.len());
//! }
//! ```

pub mod commit;
pub mod error;
pub mod reader;
pub mod revert;

pub use commit::{Commit, CommitRange, MergeEvent};
pub use error::GitError;
pub use reader::{DiffSummary, FileDiff, GitRepo, MergeQuery, truncate_lines};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::commit::{Commit, CommitRange, MergeEvent};
    pub use crate::error::GitError;
    pub use crate::reader::{DiffSummary, GitRepo, MergeQuery};
}
