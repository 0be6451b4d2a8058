//! mergescore: score merged pull requests with an LLM
//!
//! This binary lists the merges of a repository, scores each one through a
//! deduplicating response cache and records the results in SQLite. Logs go to
//! stderr; reports go to stdout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{debug, info};

use mergescore::cache::{CacheStats, ResponseCache};
use mergescore::config::{Command, Config};
use mergescore::db::Database;
use mergescore::pipeline::{Pipeline, ProgressEvent, RunSummary};
use mergescore::since::parse_since;
use mergescore::store::{AnalysisFilter, AuditedAnalysis, ResultStore};
use mergescore_git::GitRepo;
use mergescore_llm::{OpenAiScorer, RetryPolicy, RetryingScorer};

fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_level().into()),
        )
        .init();

    config.validate()?;
    let db_path = config.database_path();
    debug!(database = %db_path.display(), "Using database");

    match config.command {
        Some(Command::Query {
            ref author,
            ref model,
            ref since,
            ref until,
            limit,
            json,
        }) => {
            let now = Utc::now();
            let mut filter = AnalysisFilter::new();
            filter.author = author.clone();
            filter.model = model.clone();
            filter.since = since.as_deref().map(|s| parse_since(s, now)).transpose()?;
            filter.until = until.as_deref().map(|s| parse_since(s, now)).transpose()?;
            filter.limit = limit;
            query(&db_path, &filter, json)
        }
        Some(Command::Diff { ref sha, max_lines }) => diff(&config, &db_path, sha, max_lines),
        None => analyze(&config, &db_path),
    }
}

fn open_database(path: &Path) -> Result<Database> {
    Database::open_initialized(path)
        .with_context(|| format!("Failed to open database {}", path.display()))
}

fn analyze(config: &Config, db_path: &Path) -> Result<()> {
    let mut cache = ResponseCache::new(open_database(db_path)?)?;

    if config.cache_stats {
        print_cache_stats(&cache.stats()?, config.json)?;
        return Ok(());
    }

    if config.clear_cache && config.since.is_none() {
        let removed = cache.clear()?;
        println!("Cleared {removed} cached responses");
        return Ok(());
    }

    let request = config.run_request(Utc::now())?;
    let repo_path = config
        .repo_path()
        .context("Cannot determine the repository path")?;
    let repo = GitRepo::open(&repo_path)?;

    let api_key = config.api_key.clone().unwrap_or_default();
    let mut client = OpenAiScorer::new(api_key, config.model.as_str())?;
    if let Some(ref base_url) = config.base_url {
        client = client.with_base_url(base_url.as_str());
    }
    let scorer = RetryingScorer::new(client, RetryPolicy::with_retries(config.max_retries));
    let store = ResultStore::new(open_database(db_path)?)?;

    // Only clear once the run is able to start
    if config.clear_cache {
        let removed = cache.clear()?;
        info!(removed, "Cleared response cache");
    }

    let progress = Box::new(|event: &ProgressEvent| match event {
        ProgressEvent::Started { total } => info!(total, "Scoring merges"),
        ProgressEvent::Merge { sha, outcome } => debug!(merge = %sha, ?outcome, "Merge done"),
        ProgressEvent::Completed { .. } => {}
    });
    let mut pipeline = Pipeline::new(scorer, cache, store).with_progress(progress);

    let summary = pipeline.run(&repo, &request)?;
    print_summary(&summary, &pipeline.cache().stats()?, config.json)
}

fn query(db_path: &Path, filter: &AnalysisFilter, json: bool) -> Result<()> {
    let store = ResultStore::new(open_database(db_path)?)?;
    let rows = store.query(filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No analyses found");
        return Ok(());
    }
    for row in &rows {
        println!("{}", format_row(row));
    }

    let summary = store.summary(filter)?;
    if let Some(mean) = summary.mean_overall {
        println!();
        println!(
            "{} analyses, mean overall {mean:.1}, +{} -{}",
            summary.count, summary.total_additions, summary.total_deletions
        );
    }
    Ok(())
}

fn format_row(row: &AuditedAnalysis) -> String {
    let short = row.merge_sha.get(..8).unwrap_or(&row.merge_sha);
    format!(
        "{short}  {}  {:<16}  {:>5.1}  {}  [{}]",
        row.merged_at.format("%Y-%m-%d"),
        row.author,
        row.score.overall_score,
        row.subject,
        row.model
    )
}

fn diff(config: &Config, db_path: &Path, sha: &str, max_lines: usize) -> Result<()> {
    // Prefer the repository the merge was analyzed from
    let stored_repo = ResultStore::new(open_database(db_path)?)?
        .query(&AnalysisFilter::new().merge(sha).limit(1))?
        .into_iter()
        .next()
        .map(|row| row.repo_path);

    let repo_path = match stored_repo {
        Some(path) if Path::new(&path).exists() => PathBuf::from(path),
        _ => config
            .repo_path()
            .context("Cannot determine the repository path")?,
    };

    let repo = GitRepo::open(&repo_path)?;
    println!("{}", repo.display_diff(sha, max_lines)?);
    Ok(())
}

fn print_cache_stats(stats: &CacheStats, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }

    println!("Cache entries: {}", stats.entries);
    for (model, count) in &stats.by_model {
        println!("  {model}: {count}");
    }
    println!("Hits: {}  Misses: {}", stats.hits, stats.misses);
    Ok(())
}

fn print_summary(summary: &RunSummary, cache: &CacheStats, json: bool) -> Result<()> {
    if json {
        let report = serde_json::json!({ "summary": summary, "cache": cache });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Run {}", summary.run_id);
    println!("  Discovered:  {}", summary.discovered);
    println!(
        "  Processed:   {} (cache hits {}, misses {})",
        summary.processed, summary.cache_hits, summary.cache_misses
    );
    println!("  Failed:      {}", summary.failed);
    println!("  Skipped:     {}", summary.skipped);
    for failure in &summary.failures {
        println!(
            "    {} {}: {}",
            failure.merge_sha, failure.reason, failure.message
        );
    }
    println!("Cache entries: {}", cache.entries);
    Ok(())
}
