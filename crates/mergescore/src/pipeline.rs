// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Merge scoring pipeline
//!
//! Walks the merges of a repository in ascending (timestamp, SHA) order and,
//! for each one, filters its commits, fingerprints the rendered prompt,
//! consults the response cache, calls the scorer on a miss and persists the
//! result. Per-merge scoring failures are recorded and the run continues;
//! repository and storage failures end the run.
//!
//! # Example
//!
//! ```no_run
//! use mergescore::cache::ResponseCache;
//! use mergescore::pipeline::{Pipeline, RunRequest};
//! use mergescore::store::ResultStore;
//! use mergescore_git::GitRepo;
//! use mergescore_llm::{OpenAiScorer, RetryPolicy, RetryingScorer};
//!
//! let scorer = RetryingScorer::new(
//!     OpenAiScorer::new("sk-...", "gpt-4o-mini").expect("client"),
//!     RetryPolicy::default(),
//! );
//! let mut pipeline = Pipeline::new(
//!     scorer,
//!     ResponseCache::in_memory().expect("cache"),
//!     ResultStore::in_memory().expect("store"),
//! );
//! let repo = GitRepo::open(".").expect("repo");
//! let summary = pipeline.run(&repo, &RunRequest::default()).expect("run");
//! println!("{} processed, {} failed", summary.processed, summary.failed);
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use mergescore_git::{GitError, GitRepo, MergeEvent, MergeQuery, revert};
use mergescore_llm::{ScoreRecord, Scorer};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::authors::AuthorFilter;
use crate::cache::{CacheEntry, CacheError, ResponseCache};
use crate::fingerprint::{Fingerprint, fingerprint};
use crate::prepare::{PreparedMerge, prepare};
use crate::store::{AuditedAnalysis, ResultStore, StoreError};

/// Diff lines sent to the scorer unless configured otherwise
pub const DEFAULT_MAX_DIFF_LINES: usize = 500;

/// Points an `overall_score` may differ from the weighted sub-scores before it is flagged
pub const OVERALL_DRIFT_TOLERANCE: f64 = 10.0;

// ============================================================================
// Error Types
// ============================================================================

/// Run-fatal errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Repository could not be read
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// Response cache failed
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Result store failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

// ============================================================================
// Request and Summary
// ============================================================================

/// What to analyze in one run
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Only merges at or after this time
    pub since: Option<DateTime<Utc>>,
    /// Commit authors that count
    pub authors: AuthorFilter,
    /// Diff budget for the prompt; zero leaves the diff out
    pub max_diff_lines: usize,
    /// Skip merges whose effect a later revert cancels
    pub skip_revert_chains: bool,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            since: None,
            authors: AuthorFilter::Any,
            max_diff_lines: DEFAULT_MAX_DIFF_LINES,
            skip_revert_chains: true,
        }
    }
}

impl RunRequest {
    /// Merges at or after `since`
    #[must_use]
    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            ..Self::default()
        }
    }

    /// Set the author filter
    #[must_use]
    pub fn with_authors(mut self, authors: AuthorFilter) -> Self {
        self.authors = authors;
        self
    }

    /// Set the diff budget
    #[must_use]
    pub fn with_max_diff_lines(mut self, lines: usize) -> Self {
        self.max_diff_lines = lines;
        self
    }

    /// Score every merge of a revert chain
    #[must_use]
    pub fn keep_revert_chains(mut self) -> Self {
        self.skip_revert_chains = false;
        self
    }
}

/// Why a merge was not scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A later merge reverts or re-applies it
    RevertChain,
    /// None of its commits are by a configured author
    NoMatchingAuthors,
}

impl SkipReason {
    /// Stable name used in summaries
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RevertChain => "revert_chain",
            Self::NoMatchingAuthors => "no_matching_authors",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Score reused from the cache and persisted
    CacheHit,
    /// Scorer called and the result persisted
    Scored,
    /// Scorer failed; nothing cached or persisted
    Failed {
        /// Failure kind, e.g. `malformed_response`
        kind: String,
        /// Human-readable detail
        message: String,
    },
    /// Not scored
    Skipped {
        /// Why
        reason: SkipReason,
    },
}

/// A merge whose scoring failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeFailure {
    /// Merge SHA
    pub merge_sha: String,
    /// Failure kind
    pub reason: String,
    /// Human-readable detail
    pub message: String,
}

/// A merge that was not scored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMerge {
    /// Merge SHA
    pub merge_sha: String,
    /// Why
    pub reason: SkipReason,
}

/// Counts for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Identifier written to every row of this run
    pub run_id: String,
    /// Merges found in the time window
    pub discovered: usize,
    /// Merges persisted, from cache or freshly scored
    pub processed: usize,
    /// Merges served from the cache
    pub cache_hits: usize,
    /// Merges that needed a scorer call
    pub cache_misses: usize,
    /// Merges whose scoring failed
    pub failed: usize,
    /// Merges not scored
    pub skipped: usize,
    /// Details of each failure
    pub failures: Vec<MergeFailure>,
    /// Details of each skip
    pub skips: Vec<SkippedMerge>,
}

impl RunSummary {
    fn record(&mut self, merge_sha: &str, outcome: &MergeOutcome) {
        match outcome {
            MergeOutcome::CacheHit => {
                self.cache_hits += 1;
                self.processed += 1;
            }
            MergeOutcome::Scored => {
                self.cache_misses += 1;
                self.processed += 1;
            }
            MergeOutcome::Failed { kind, message } => {
                self.cache_misses += 1;
                self.failed += 1;
                self.failures.push(MergeFailure {
                    merge_sha: merge_sha.to_string(),
                    reason: kind.clone(),
                    message: message.clone(),
                });
            }
            MergeOutcome::Skipped { reason } => {
                self.skipped += 1;
                self.skips.push(SkippedMerge {
                    merge_sha: merge_sha.to_string(),
                    reason: *reason,
                });
            }
        }
    }
}

// ============================================================================
// Progress Reporting
// ============================================================================

/// Progress callback signature
pub type ProgressCallback = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Progress event during a run
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Merges listed, processing about to begin
    Started {
        /// Merges to process
        total: usize,
    },
    /// One merge finished
    Merge {
        /// Merge SHA
        sha: String,
        /// What happened
        outcome: MergeOutcome,
    },
    /// Run finished
    Completed {
        /// Final counts
        summary: RunSummary,
    },
}

// ============================================================================
// Pipeline
// ============================================================================

/// Scores merges through a cache into a result store
pub struct Pipeline<S> {
    scorer: S,
    cache: ResponseCache,
    store: ResultStore,
    progress: Option<ProgressCallback>,
}

impl<S: Scorer> Pipeline<S> {
    /// Assemble a pipeline from its parts
    pub fn new(scorer: S, cache: ResponseCache, store: ResultStore) -> Self {
        Self {
            scorer,
            cache,
            store,
            progress: None,
        }
    }

    /// Set a progress callback
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    fn report(&self, event: ProgressEvent) {
        if let Some(ref callback) = self.progress {
            callback(&event);
        }
    }

    /// The scorer
    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    /// The response cache
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Mutable response cache, e.g. to clear it between runs
    pub fn cache_mut(&mut self) -> &mut ResponseCache {
        &mut self.cache
    }

    /// The result store
    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Score every qualifying merge of `repo`
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` when the repository cannot be read or the cache
    /// or store fails. Rows committed before the failure remain valid.
    pub fn run(&mut self, repo: &GitRepo, request: &RunRequest) -> Result<RunSummary, PipelineError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let repo_path = repo
            .workdir()
            .unwrap_or_else(|| repo.path())
            .display()
            .to_string();

        info!(run = %run_id, repo = %repo_path, model = %self.scorer.model(), "Starting analysis run");

        let query = MergeQuery {
            since: request.since,
            ..MergeQuery::default()
        };
        let merges = repo.list_merges(&query)?;

        let prepared: Vec<Option<PreparedMerge<'_>>> = merges
            .iter()
            .map(|merge| prepare(merge, &request.authors, request.max_diff_lines))
            .collect();

        // Chains are judged among merges that still have matching commits
        let superseded = if request.skip_revert_chains {
            revert::superseded(
                prepared
                    .iter()
                    .flatten()
                    .map(|p| (p.merge.sha(), p.merge.subject())),
            )
        } else {
            Default::default()
        };
        if !superseded.is_empty() {
            debug!(count = superseded.len(), "Revert-chain merges will be skipped");
        }

        let mut summary = RunSummary {
            run_id: run_id.clone(),
            discovered: merges.len(),
            ..RunSummary::default()
        };
        self.report(ProgressEvent::Started {
            total: merges.len(),
        });

        for (merge, prepared) in merges.iter().zip(&prepared) {
            let outcome = match prepared {
                None => MergeOutcome::Skipped {
                    reason: SkipReason::NoMatchingAuthors,
                },
                Some(_) if superseded.contains(merge.sha()) => MergeOutcome::Skipped {
                    reason: SkipReason::RevertChain,
                },
                Some(prepared) => self.process(prepared, &run_id, &repo_path)?,
            };

            debug!(merge = %merge.sha(), outcome = ?outcome, "Merge finished");
            summary.record(merge.sha(), &outcome);
            self.report(ProgressEvent::Merge {
                sha: merge.sha().to_string(),
                outcome,
            });
        }

        info!(
            run = %run_id,
            discovered = summary.discovered,
            processed = summary.processed,
            cache_hits = summary.cache_hits,
            cache_misses = summary.cache_misses,
            failed = summary.failed,
            skipped = summary.skipped,
            "Analysis run complete"
        );
        self.report(ProgressEvent::Completed {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    fn process(
        &mut self,
        prepared: &PreparedMerge<'_>,
        run_id: &str,
        repo_path: &str,
    ) -> Result<MergeOutcome, PipelineError> {
        let sha = prepared.merge.sha();
        let model = self.scorer.model().to_string();
        let fp = fingerprint(sha, &prepared.prompt.cache_payload(), &model);

        if let Some(raw) = self.cache.get(&fp)? {
            match ScoreRecord::from_response(&raw) {
                Ok(record) => {
                    let analysis = audited(prepared, record, &model, fp, run_id, repo_path, true);
                    self.store.upsert(&analysis)?;
                    return Ok(MergeOutcome::CacheHit);
                }
                Err(e) => {
                    warn!(merge = %sha, fingerprint = %fp, error = %e, "Discarding invalid cached response");
                    self.cache.discard(&fp)?;
                }
            }
        }

        let scored = match self.scorer.score(&prepared.prompt) {
            Ok(scored) => scored,
            Err(e) => {
                warn!(merge = %sha, kind = e.kind(), error = %e, "Scoring failed");
                return Ok(MergeOutcome::Failed {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                });
            }
        };

        if let Some(drift) = overall_drift(&scored.record) {
            warn!(
                merge = %sha,
                reported = scored.record.overall_score,
                weighted = scored.record.weighted_overall(),
                drift,
                "Overall score disagrees with the weighted sub-scores"
            );
        }

        self.cache
            .put(&CacheEntry::new(fp.clone(), sha, model.as_str(), scored.raw))?;
        let analysis = audited(prepared, scored.record, &model, fp, run_id, repo_path, false);
        self.store.upsert(&analysis)?;
        Ok(MergeOutcome::Scored)
    }
}

/// Gap between the reported and weighted overall score, when it exceeds
/// [`OVERALL_DRIFT_TOLERANCE`]
fn overall_drift(record: &ScoreRecord) -> Option<f64> {
    let drift = (record.overall_score - record.weighted_overall()).abs();
    (drift > OVERALL_DRIFT_TOLERANCE).then_some(drift)
}

fn audited(
    prepared: &PreparedMerge<'_>,
    score: ScoreRecord,
    model: &str,
    fingerprint: Fingerprint,
    run_id: &str,
    repo_path: &str,
    from_cache: bool,
) -> AuditedAnalysis {
    let merge: &MergeEvent = prepared.merge;
    AuditedAnalysis {
        merge_sha: merge.sha().to_string(),
        model: model.to_string(),
        repo_path: repo_path.to_string(),
        subject: merge.subject().to_string(),
        message: merge.merge.message.clone(),
        author: prepared.primary_author.clone(),
        merge_author: merge.merge.author.clone(),
        merged_at: merge.timestamp(),
        parents: merge.merge.parents.clone(),
        commit_shas: prepared.commit_shas(),
        additions: merge.diff.insertions,
        deletions: merge.diff.deletions,
        files_changed: merge.diff.files_changed,
        development_hours: prepared.development_hours,
        review_hours: prepared.review_hours,
        score,
        fingerprint,
        run_id: run_id.to_string(),
        from_cache,
        analyzed_at: Utc::now(),
    }
}
