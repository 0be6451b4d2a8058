//! Result store for scored merges
//!
//! One row per (merge, model). Re-scoring a merge under the same model
//! overwrites its row; a different model gets a row of its own because overall
//! scores are not comparable across models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mergescore_llm::ScoreRecord;
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::db::{Database, DbError, format_timestamp, parse_timestamp};
use crate::fingerprint::Fingerprint;

/// Result store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON column could not be encoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A scored merge with its audit fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditedAnalysis {
    /// Merge commit SHA
    pub merge_sha: String,
    /// Model that produced the score
    pub model: String,
    /// Repository the merge was read from
    pub repo_path: String,
    /// Merge subject line
    pub subject: String,
    /// Full merge message
    pub message: String,
    /// Author of the first author-filtered subsumed commit
    pub author: String,
    /// Author of the merge commit
    pub merge_author: String,
    /// Merge timestamp
    pub merged_at: DateTime<Utc>,
    /// Parent SHAs of the merge
    pub parents: Vec<String>,
    /// Author-filtered subsumed commit SHAs, oldest first
    pub commit_shas: Vec<String>,
    /// Lines added in the first-parent diff
    pub additions: usize,
    /// Lines deleted in the first-parent diff
    pub deletions: usize,
    /// Files touched by the first-parent diff
    pub files_changed: usize,
    /// Hours between first and last filtered commit
    pub development_hours: f64,
    /// Hours between last filtered commit and the merge
    pub review_hours: f64,
    /// The validated score
    pub score: ScoreRecord,
    /// Cache key the score is stored under
    pub fingerprint: Fingerprint,
    /// Run that wrote this row
    pub run_id: String,
    /// Whether the score was served from the cache
    pub from_cache: bool,
    /// When this row was written
    pub analyzed_at: DateTime<Utc>,
}

impl AuditedAnalysis {
    /// Number of subsumed commits that were scored
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commit_shas.len()
    }
}

/// Filters for [`ResultStore::query`]; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisFilter {
    /// Exact merge SHA
    pub merge_sha: Option<String>,
    /// Exact primary author
    pub author: Option<String>,
    /// Exact model identifier
    pub model: Option<String>,
    /// Inclusive lower bound on merge time
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on merge time
    pub until: Option<DateTime<Utc>>,
    /// Maximum rows returned
    pub limit: Option<usize>,
}

impl AnalysisFilter {
    /// Match everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one merge
    #[must_use]
    pub fn merge(mut self, sha: impl Into<String>) -> Self {
        self.merge_sha = Some(sha.into());
        self
    }

    /// Restrict to one author
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Restrict to one model
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Merges at or after `since`
    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Merges at or before `until`
    #[must_use]
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// At most `limit` rows
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Aggregates over a filtered set of analyses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    /// Matching rows
    pub count: usize,
    /// Mean overall score, `None` when nothing matched
    pub mean_overall: Option<f64>,
    /// Sum of lines added
    pub total_additions: usize,
    /// Sum of lines deleted
    pub total_deletions: usize,
    /// Rows per primary author
    pub by_author: BTreeMap<String, usize>,
}

const COLUMNS: &str = "merge_sha, model, repo_path, subject, message, author, merge_author, \
    merged_at, parents_json, commits_json, commit_count, additions, deletions, files_changed, \
    development_hours, review_hours, ai_utilization, code_quality_impact, delivery_velocity, \
    innovation_level, team_collaboration, overall_score, rationale, fingerprint, run_id, \
    from_cache, analyzed_at";

const FILTER: &str = "(?1 IS NULL OR merge_sha = ?1) \
    AND (?2 IS NULL OR author = ?2) \
    AND (?3 IS NULL OR model = ?3) \
    AND (?4 IS NULL OR merged_at >= ?4) \
    AND (?5 IS NULL OR merged_at <= ?5)";

/// Durable table of scored merges
pub struct ResultStore {
    db: Database,
}

impl ResultStore {
    /// Wrap `db`, applying migrations if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn new(db: Database) -> Result<Self, StoreError> {
        db.initialize()?;
        Ok(Self { db })
    }

    /// Fresh in-memory store
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot create the database.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::new(Database::in_memory()?)
    }

    /// Insert or overwrite the row for `(merge_sha, model)` in its own transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; earlier rows are unaffected.
    pub fn upsert(&mut self, analysis: &AuditedAnalysis) -> Result<(), StoreError> {
        let parents_json = serde_json::to_string(&analysis.parents)?;
        let commits_json = serde_json::to_string(&analysis.commit_shas)?;

        let tx = self.db.connection_mut().transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO merge_analyses ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, \
                 ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, \
                 ?25, ?26, ?27) \
                 ON CONFLICT(merge_sha, model) DO UPDATE SET \
                 repo_path = excluded.repo_path, subject = excluded.subject, \
                 message = excluded.message, author = excluded.author, \
                 merge_author = excluded.merge_author, merged_at = excluded.merged_at, \
                 parents_json = excluded.parents_json, commits_json = excluded.commits_json, \
                 commit_count = excluded.commit_count, additions = excluded.additions, \
                 deletions = excluded.deletions, files_changed = excluded.files_changed, \
                 development_hours = excluded.development_hours, \
                 review_hours = excluded.review_hours, ai_utilization = excluded.ai_utilization, \
                 code_quality_impact = excluded.code_quality_impact, \
                 delivery_velocity = excluded.delivery_velocity, \
                 innovation_level = excluded.innovation_level, \
                 team_collaboration = excluded.team_collaboration, \
                 overall_score = excluded.overall_score, rationale = excluded.rationale, \
                 fingerprint = excluded.fingerprint, run_id = excluded.run_id, \
                 from_cache = excluded.from_cache, analyzed_at = excluded.analyzed_at"
            ),
            params![
                analysis.merge_sha,
                analysis.model,
                analysis.repo_path,
                analysis.subject,
                analysis.message,
                analysis.author,
                analysis.merge_author,
                format_timestamp(&analysis.merged_at),
                parents_json,
                commits_json,
                analysis.commit_count() as i64,
                analysis.additions as i64,
                analysis.deletions as i64,
                analysis.files_changed as i64,
                analysis.development_hours,
                analysis.review_hours,
                analysis.score.ai_utilization,
                analysis.score.code_quality_impact,
                analysis.score.delivery_velocity,
                analysis.score.innovation_level,
                analysis.score.team_collaboration,
                analysis.score.overall_score,
                analysis.score.rationale,
                analysis.fingerprint.as_str(),
                analysis.run_id,
                analysis.from_cache,
                format_timestamp(&analysis.analyzed_at),
            ],
        )?;
        tx.commit()?;

        debug!(merge = %analysis.merge_sha, model = %analysis.model, "Stored analysis");
        Ok(())
    }

    /// Analyses matching `filter`, ordered by merge time then SHA
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails. No match is an empty vector.
    pub fn query(&self, filter: &AnalysisFilter) -> Result<Vec<AuditedAnalysis>, StoreError> {
        let since = filter.since.as_ref().map(format_timestamp);
        let until = filter.until.as_ref().map(format_timestamp);
        let limit = filter.limit.map_or(-1, |l| l as i64);

        let mut stmt = self.db.connection().prepare(&format!(
            "SELECT {COLUMNS} FROM merge_analyses WHERE {FILTER} \
             ORDER BY merged_at ASC, merge_sha ASC, model ASC LIMIT ?6"
        ))?;
        let rows = stmt.query_map(
            params![
                filter.merge_sha,
                filter.author,
                filter.model,
                since,
                until,
                limit
            ],
            row_to_analysis,
        )?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// The row for one merge under one model
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, merge_sha: &str, model: &str) -> Result<Option<AuditedAnalysis>, StoreError> {
        let analysis = self
            .db
            .connection()
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM merge_analyses WHERE merge_sha = ?1 AND model = ?2"
                ),
                [merge_sha, model],
                row_to_analysis,
            )
            .optional()?;
        Ok(analysis)
    }

    /// Aggregates over the rows matching `filter` (its limit is ignored)
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn summary(&self, filter: &AnalysisFilter) -> Result<StoreSummary, StoreError> {
        let unlimited = AnalysisFilter {
            limit: None,
            ..filter.clone()
        };
        let rows = self.query(&unlimited)?;

        let mut summary = StoreSummary {
            count: rows.len(),
            ..StoreSummary::default()
        };
        let mut total = 0.0;
        for row in &rows {
            total += row.score.overall_score;
            summary.total_additions += row.additions;
            summary.total_deletions += row.deletions;
            *summary.by_author.entry(row.author.clone()).or_default() += 1;
        }
        if !rows.is_empty() {
            summary.mean_overall = Some(total / rows.len() as f64);
        }
        Ok(summary)
    }

    /// Total stored rows
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self) -> Result<usize, StoreError> {
        let count = self.db.count("merge_analyses")?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// The underlying database
    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn row_to_analysis(row: &Row<'_>) -> rusqlite::Result<AuditedAnalysis> {
    let parents_json: String = row.get(8)?;
    let commits_json: String = row.get(9)?;
    let merged_at: String = row.get(7)?;
    let analyzed_at: String = row.get(26)?;

    Ok(AuditedAnalysis {
        merge_sha: row.get(0)?,
        model: row.get(1)?,
        repo_path: row.get(2)?,
        subject: row.get(3)?,
        message: row.get(4)?,
        author: row.get(5)?,
        merge_author: row.get(6)?,
        merged_at: parse_timestamp(7, &merged_at)?,
        parents: parse_json_list(8, &parents_json)?,
        commit_shas: parse_json_list(9, &commits_json)?,
        additions: to_usize(row.get(11)?),
        deletions: to_usize(row.get(12)?),
        files_changed: to_usize(row.get(13)?),
        development_hours: row.get(14)?,
        review_hours: row.get(15)?,
        score: ScoreRecord {
            ai_utilization: row.get(16)?,
            code_quality_impact: row.get(17)?,
            delivery_velocity: row.get(18)?,
            innovation_level: row.get(19)?,
            team_collaboration: row.get(20)?,
            overall_score: row.get(21)?,
            rationale: row.get(22)?,
        },
        fingerprint: Fingerprint::from_hex(row.get::<_, String>(23)?),
        run_id: row.get(24)?,
        from_cache: row.get(25)?,
        analyzed_at: parse_timestamp(26, &analyzed_at)?,
    })
}

fn parse_json_list(column: usize, text: &str) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn to_usize(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use similar_asserts::assert_eq;

    fn score(overall: f64) -> ScoreRecord {
        ScoreRecord {
            ai_utilization: 5.0,
            code_quality_impact: 6.0,
            delivery_velocity: 7.0,
            innovation_level: 4.0,
            team_collaboration: 3.0,
            overall_score: overall,
            rationale: "solid change".to_string(),
        }
    }

    fn analysis(sha: &str, model: &str, author: &str, day: u32) -> AuditedAnalysis {
        let merged_at = Utc.with_ymd_and_hms(2026, 1, day, 12, 0, 0).unwrap();
        AuditedAnalysis {
            merge_sha: sha.to_string(),
            model: model.to_string(),
            repo_path: "/tmp/repo".to_string(),
            subject: format!("Merge {sha}"),
            message: format!("Merge {sha}\n\nbody"),
            author: author.to_string(),
            merge_author: "maintainer".to_string(),
            merged_at,
            parents: vec!["p1".to_string(), "p2".to_string()],
            commit_shas: vec!["c1".to_string(), "c2".to_string()],
            additions: 10,
            deletions: 2,
            files_changed: 3,
            development_hours: 1.5,
            review_hours: 0.25,
            score: score(55.0),
            fingerprint: Fingerprint::from_hex("ab".repeat(32)),
            run_id: "run-1".to_string(),
            from_cache: false,
            analyzed_at: merged_at,
        }
    }

    #[test]
    fn test_upsert_and_get_round_trip() {
        let mut store = ResultStore::in_memory().expect("store");
        let a = analysis("aaa", "m", "alice", 1);
        store.upsert(&a).expect("upsert");

        let stored = store.get("aaa", "m").expect("get").expect("present");
        assert_eq!(stored, a);
        assert_eq!(stored.commit_count(), 2);
    }

    #[test]
    fn test_upsert_same_model_overwrites() {
        let mut store = ResultStore::in_memory().expect("store");
        let mut a = analysis("aaa", "m", "alice", 1);
        store.upsert(&a).expect("first");

        a.score = score(80.0);
        a.from_cache = true;
        a.run_id = "run-2".to_string();
        store.upsert(&a).expect("second");

        assert_eq!(store.count().expect("count"), 1);
        let stored = store.get("aaa", "m").expect("get").expect("present");
        assert_eq!(stored.score.overall_score, 80.0);
        assert!(stored.from_cache);
        assert_eq!(stored.run_id, "run-2");
    }

    #[test]
    fn test_other_model_is_separate_row() {
        let mut store = ResultStore::in_memory().expect("store");
        store.upsert(&analysis("aaa", "m1", "alice", 1)).expect("m1");
        store.upsert(&analysis("aaa", "m2", "alice", 1)).expect("m2");

        assert_eq!(store.count().expect("count"), 2);
        assert_eq!(
            store
                .query(&AnalysisFilter::new().merge("aaa"))
                .expect("query")
                .len(),
            2
        );
    }

    #[test]
    fn test_query_empty_store() {
        let store = ResultStore::in_memory().expect("store");
        assert!(store.query(&AnalysisFilter::new()).expect("query").is_empty());
        assert_eq!(store.get("nope", "m").expect("get"), None);
    }

    #[test]
    fn test_query_filters() {
        let mut store = ResultStore::in_memory().expect("store");
        store.upsert(&analysis("c3", "m", "alice", 3)).expect("upsert");
        store.upsert(&analysis("a1", "m", "alice", 1)).expect("upsert");
        store.upsert(&analysis("b2", "m", "bob", 2)).expect("upsert");
        store.upsert(&analysis("b2", "other", "bob", 2)).expect("upsert");

        let all: Vec<String> = store
            .query(&AnalysisFilter::new().model("m"))
            .expect("query")
            .into_iter()
            .map(|a| a.merge_sha)
            .collect();
        assert_eq!(all, vec!["a1", "b2", "c3"]);

        let alice = store
            .query(&AnalysisFilter::new().author("alice"))
            .expect("query");
        assert_eq!(alice.len(), 2);

        let window = store
            .query(
                &AnalysisFilter::new()
                    .model("m")
                    .since(Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap())
                    .until(Utc.with_ymd_and_hms(2026, 1, 2, 23, 59, 59).unwrap()),
            )
            .expect("query");
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].merge_sha, "b2");

        let limited = store
            .query(&AnalysisFilter::new().limit(2))
            .expect("query");
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_summary() {
        let mut store = ResultStore::in_memory().expect("store");
        let mut high = analysis("a1", "m", "alice", 1);
        high.score = score(90.0);
        store.upsert(&high).expect("upsert");
        store.upsert(&analysis("b2", "m", "bob", 2)).expect("upsert");

        let summary = store
            .summary(&AnalysisFilter::new().limit(1))
            .expect("summary");
        assert_eq!(summary.count, 2);
        assert_eq!(summary.mean_overall, Some(72.5));
        assert_eq!(summary.total_additions, 20);
        assert_eq!(summary.total_deletions, 4);
        assert_eq!(summary.by_author.get("alice"), Some(&1));

        let empty = store
            .summary(&AnalysisFilter::new().author("carol"))
            .expect("summary");
        assert_eq!(empty.count, 0);
        assert_eq!(empty.mean_overall, None);
    }
}
