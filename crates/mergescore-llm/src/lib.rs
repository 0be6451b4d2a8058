// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! mergescore-llm: LLM scoring for mergescore
//!
//! This library crate holds the scoring side of mergescore: the [`Scorer`]
//! capability, the rubric and prompt renderer, validation of replies into
//! [`ScoreRecord`]s, a bounded retry decorator and an OpenAI-compatible client.

#![warn(missing_docs)]

//! ## Failure taxonomy
//!
//! Every scorer reports failures as a [`ScoringError`]:
//! - `Auth` and `Malformed` are never retried
//! - `RateLimited` and `Transient` are retried by [`RetryingScorer`] within its
//!   [`RetryPolicy`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use mergescore_llm::{OpenAiScorer, RetryPolicy, RetryingScorer, Scorer};
//! use mergescore_llm::rubric::Prompt;
//!
//! let client = OpenAiScorer::new("sk-...", "gpt-4o-mini").expect("client");
//! let scorer = RetryingScorer::new(client, RetryPolicy::with_retries(3));
//! let prompt = Prompt { system: "...".into(), user: "...".into() };
//! match scorer.score(&prompt) {
//!     Ok(scored) => println!("overall {}", scored.record.overall_score),
//!     Err(e) => eprintln!("{}: {e}", e.kind()),
//! }
//! ```

pub mod error;
pub mod openai;
pub mod retry;
pub mod rubric;
pub mod score;
pub mod scorer;

pub use error::ScoringError;
pub use openai::OpenAiScorer;
pub use retry::{RetryPolicy, RetryingScorer};
pub use rubric::{CommitLine, MergeContext, Prompt};
pub use score::{Dimension, ScoreRecord};
pub use scorer::{Scored, Scorer};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::ScoringError;
    pub use crate::rubric::{MergeContext, Prompt};
    pub use crate::score::ScoreRecord;
    pub use crate::scorer::{Scored, Scorer};
}
