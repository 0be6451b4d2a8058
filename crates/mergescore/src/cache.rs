// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Response cache
//!
//! Maps a [`Fingerprint`] to the raw reply the scorer gave for it, so a
//! (merge, payload, model) combination is paid for once. Hit and miss counts
//! belong to the handle; entries persist in the database.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::db::{Database, DbError, format_timestamp, parse_timestamp};
use crate::fingerprint::Fingerprint;

// ============================================================================
// Error Types
// ============================================================================

/// Cache errors; all of them are storage failures
#[derive(Debug, Error)]
pub enum CacheError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

// ============================================================================
// Records
// ============================================================================

/// A cached scorer reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cache key
    pub fingerprint: Fingerprint,
    /// Merge the reply was obtained for
    pub merge_sha: String,
    /// Model that produced the reply
    pub model: String,
    /// Raw reply text
    pub response: String,
    /// When the reply was stored
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// New entry stamped with the current time
    #[must_use]
    pub fn new(
        fingerprint: Fingerprint,
        merge_sha: impl Into<String>,
        model: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            fingerprint,
            merge_sha: merge_sha.into(),
            model: model.into(),
            response: response.into(),
            created_at: Utc::now(),
        }
    }
}

/// Snapshot of cache contents and this handle's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Stored entries
    pub entries: u64,
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Stored entries per model
    pub by_model: BTreeMap<String, u64>,
}

// ============================================================================
// Cache
// ============================================================================

/// Persistent fingerprint to reply store
pub struct ResponseCache {
    db: Database,
    hits: u64,
    misses: u64,
}

impl ResponseCache {
    /// Wrap `db`, applying migrations if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn new(db: Database) -> Result<Self, CacheError> {
        db.initialize()?;
        Ok(Self {
            db,
            hits: 0,
            misses: 0,
        })
    }

    /// Fresh in-memory cache
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot create the database.
    pub fn in_memory() -> Result<Self, CacheError> {
        Self::new(Database::in_memory()?)
    }

    /// Look up a reply, counting the hit or miss
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&mut self, fingerprint: &Fingerprint) -> Result<Option<String>, CacheError> {
        let response = self.peek(fingerprint)?;
        if response.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        debug!(fingerprint = %fingerprint, hit = response.is_some(), "Cache lookup");
        Ok(response)
    }

    /// Look up a reply without touching the counters
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn peek(&self, fingerprint: &Fingerprint) -> Result<Option<String>, CacheError> {
        let response = self
            .db
            .connection()
            .query_row(
                "SELECT response FROM llm_cache WHERE fingerprint = ?1",
                [fingerprint.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(response)
    }

    /// Fetch a full entry
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn entry(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        let entry = self
            .db
            .connection()
            .query_row(
                "SELECT fingerprint, merge_sha, model, response, created_at \
                 FROM llm_cache WHERE fingerprint = ?1",
                [fingerprint.as_str()],
                |row| {
                    Ok(CacheEntry {
                        fingerprint: Fingerprint::from_hex(row.get::<_, String>(0)?),
                        merge_sha: row.get(1)?,
                        model: row.get(2)?,
                        response: row.get(3)?,
                        created_at: parse_timestamp(4, &row.get::<_, String>(4)?)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    /// Store a reply; an existing entry for the same fingerprint is replaced
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.db.connection().execute(
            "INSERT OR REPLACE INTO llm_cache (fingerprint, merge_sha, model, response, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.fingerprint.as_str(),
                entry.merge_sha,
                entry.model,
                entry.response,
                format_timestamp(&entry.created_at),
            ],
        )?;
        debug!(fingerprint = %entry.fingerprint, merge = %entry.merge_sha, "Cached response");
        Ok(())
    }

    /// Drop an entry whose reply no longer validates
    ///
    /// The lookup that returned it is recounted as a miss.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn discard(&mut self, fingerprint: &Fingerprint) -> Result<(), CacheError> {
        let removed = self.db.connection().execute(
            "DELETE FROM llm_cache WHERE fingerprint = ?1",
            [fingerprint.as_str()],
        )?;
        if removed > 0 && self.hits > 0 {
            self.hits -= 1;
            self.misses += 1;
        }
        Ok(())
    }

    /// Remove every entry, returning how many were removed
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn clear(&mut self) -> Result<usize, CacheError> {
        let removed = self.db.connection().execute("DELETE FROM llm_cache", [])?;
        info!(removed, "Cleared response cache");
        Ok(removed)
    }

    /// Entry counts plus this handle's hit and miss counters
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let conn = self.db.connection();
        let mut stmt =
            conn.prepare("SELECT model, COUNT(*) FROM llm_cache GROUP BY model ORDER BY model")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut by_model = BTreeMap::new();
        for row in rows {
            let (model, count) = row?;
            by_model.insert(model, count as u64);
        }

        Ok(CacheStats {
            entries: by_model.values().sum(),
            hits: self.hits,
            misses: self.misses,
            by_model,
        })
    }

    /// The underlying database
    pub fn database(&self) -> &Database {
        &self.db
    }
}
