//! Configuration for the mergescore command line
//!
//! This module provides the clap definition of the CLI together with the
//! derived settings: database location, repository path, author filter and
//! the run request handed to the pipeline.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use crate::authors::AuthorFilter;
use crate::pipeline::RunRequest;
use crate::since::parse_since;

/// Default model identifier
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Score merged pull requests with an LLM and keep the results
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "mergescore")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Subcommand to run (defaults to analysis mode)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Repository to analyze
    ///
    /// Defaults to REPO_PATH, then the current directory.
    #[arg(short, long, env = "MERGESCORE_REPO")]
    pub repo: Option<PathBuf>,

    /// Only analyze merges at or after this time
    ///
    /// Accepts RFC 3339, YYYY-MM-DD, "YYYY-MM-DD HH:MM:SS" or a relative
    /// phrase such as "2 weeks ago".
    #[arg(short, long)]
    pub since: Option<String>,

    /// Comma-separated author names or emails to include
    #[arg(short, long)]
    pub authors: Option<String>,

    /// File with one author per line; lines starting with '#' are ignored
    #[arg(long)]
    pub authors_file: Option<PathBuf>,

    /// Model identifier sent to the scorer
    #[arg(short, long, env = "MERGESCORE_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// API key for the scoring service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible service
    #[arg(long, env = "MERGESCORE_BASE_URL")]
    pub base_url: Option<String>,

    /// Maximum diff lines included in each prompt (0 omits the diff)
    #[arg(long, default_value = "500")]
    pub max_diff_lines: usize,

    /// Retries for rate-limited or transient scorer failures
    #[arg(long, default_value = "3")]
    pub max_retries: u32,

    /// Path to SQLite database file holding the cache and results
    ///
    /// Defaults to ~/.local/share/mergescore/mergescore.db (or platform equivalent).
    #[arg(short, long, env = "MERGESCORE_DATABASE")]
    pub database: Option<PathBuf>,

    /// Clear the response cache before running (exits when --since is absent)
    #[arg(long, default_value = "false")]
    pub clear_cache: bool,

    /// Print response cache statistics and exit
    #[arg(long, default_value = "false")]
    pub cache_stats: bool,

    /// Score only the net merge of each revert chain (default)
    #[arg(long, default_value = "false", overrides_with = "keep_revert_chains")]
    pub skip_revert_chains: bool,

    /// Score every merge of a revert chain instead of only the net one
    #[arg(long, default_value = "false", overrides_with = "skip_revert_chains")]
    pub keep_revert_chains: bool,

    /// Enable verbose logging (debug level)
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,

    /// Quiet mode - suppress info-level logs
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,

    /// Print the run summary as JSON
    #[arg(long, default_value = "false")]
    pub json: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show stored analyses
    Query {
        /// Only this primary author
        #[arg(long)]
        author: Option<String>,

        /// Only this model
        #[arg(long)]
        model: Option<String>,

        /// Only merges at or after this time
        #[arg(long)]
        since: Option<String>,

        /// Only merges at or before this time
        #[arg(long)]
        until: Option<String>,

        /// Maximum rows
        #[arg(long)]
        limit: Option<usize>,

        /// Print rows as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Print the diff a merge introduced
    Diff {
        /// Merge SHA or reference
        sha: String,

        /// Maximum lines printed
        #[arg(long, default_value = "2000")]
        max_lines: usize,
    },
}

impl Config {
    /// Get the database path, using a default if not specified
    ///
    /// Default location is platform-specific:
    /// - macOS: ~/Library/Application Support/mergescore/mergescore.db
    /// - Linux: ~/.local/share/mergescore/mergescore.db
    /// - Windows: %LOCALAPPDATA%\mergescore\mergescore.db
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("mergescore")
                .join("mergescore.db")
        })
    }

    /// Repository path: `--repo`, then `REPO_PATH`, then the current directory
    #[must_use]
    pub fn repo_path(&self) -> Option<PathBuf> {
        self.repo
            .clone()
            .or_else(|| std::env::var_os("REPO_PATH").map(PathBuf::from))
            .or_else(|| std::env::current_dir().ok())
    }

    /// Whether this invocation runs the analysis pipeline
    #[must_use]
    pub fn is_analysis(&self) -> bool {
        self.command.is_none()
            && !self.cache_stats
            && !(self.clear_cache && self.since.is_none())
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The repository path is given but doesn't exist
    /// - Analysis mode lacks `--since` or an API key
    /// - The database parent directory cannot be created
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref repo) = self.repo
            && !repo.is_dir()
        {
            return Err(ConfigError::RepoNotFound(repo.clone()));
        }

        if self.is_analysis() {
            if self.since.is_none() {
                return Err(ConfigError::MissingSince);
            }
            if self.api_key.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::MissingApiKey);
            }
        }

        let db_path = self.database_path();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::DatabaseDirectoryCreateFailed(parent.to_path_buf(), e))?;
        }

        Ok(())
    }

    /// Get the log level based on verbose/quiet flags
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }

    /// Author filter from `--authors` and `--authors-file`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or names nobody.
    pub fn author_filter(&self) -> Result<AuthorFilter, ConfigError> {
        AuthorFilter::from_sources(self.authors.as_deref(), self.authors_file.as_deref())
    }

    /// The pipeline request described by these options
    ///
    /// # Errors
    ///
    /// Returns an error if `--since` is missing or unparseable, or the author
    /// set is invalid.
    pub fn run_request(&self, now: DateTime<Utc>) -> Result<RunRequest, ConfigError> {
        let since = self.since.as_deref().ok_or(ConfigError::MissingSince)?;
        let mut request = RunRequest::since(parse_since(since, now)?)
            .with_authors(self.author_filter()?)
            .with_max_diff_lines(self.max_diff_lines);
        if self.keep_revert_chains {
            request = request.keep_revert_chains();
        }
        Ok(request)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Analysis requested without a time bound
    #[error("--since is required to run an analysis")]
    MissingSince,

    /// Time bound not understood
    #[error("Invalid --since value: {0:?}")]
    InvalidSince(String),

    /// Author sources given but naming nobody
    #[error("Author list is empty")]
    EmptyAuthorSet,

    /// Author file unreadable
    #[error("Cannot read authors file {path}: {source}")]
    AuthorsFile {
        /// File that could not be read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// No scorer credential
    #[error("An API key is required (--api-key or OPENAI_API_KEY)")]
    MissingApiKey,

    /// Repository path not found
    #[error("Repository path not found: {0}")]
    RepoNotFound(PathBuf),

    /// Failed to create database directory
    #[error("Failed to create database directory {0}: {1}")]
    DatabaseDirectoryCreateFailed(PathBuf, std::io::Error),
}
