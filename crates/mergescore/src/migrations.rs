//! Database migrations for mergescore
//!
//! Each migration is applied once and recorded in `schema_migrations`, so an
//! existing cache and result store survive upgrades.

use rusqlite::Connection;
use thiserror::Error;
use tracing::debug;

/// Migration errors
#[derive(Debug, Error)]
pub enum MigrationError {
    /// SQLite error during migration
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database was written by a newer mergescore
    #[error("Database schema version {found} is newer than supported version {supported}")]
    TooNew { found: i32, supported: i32 },
}

/// Current schema version
pub const CURRENT_VERSION: i32 = 1;

/// A database migration
pub struct Migration {
    /// Migration version number
    pub version: i32,
    /// Migration name/description
    pub name: &'static str,
    /// SQL to apply the migration
    pub up: &'static str,
}

/// All available migrations in order
pub static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    up: include_str!("schema.sql"),
}];

/// Get the current schema version from the database
///
/// Returns 0 if no migrations have been applied.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_version(conn: &Connection) -> Result<i32, MigrationError> {
    let table_exists: i32 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_migrations'",
        [],
        |row| row.get(0),
    )?;

    if table_exists == 0 {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Apply all pending migrations, returning the versions applied
///
/// # Errors
///
/// Returns an error if any migration fails or the database is newer than
/// this build.
pub fn migrate(conn: &Connection) -> Result<Vec<i32>, MigrationError> {
    let current_version = get_version(conn)?;
    if current_version > CURRENT_VERSION {
        return Err(MigrationError::TooNew {
            found: current_version,
            supported: CURRENT_VERSION,
        });
    }

    let mut applied = Vec::new();
    for migration in MIGRATIONS {
        if migration.version > current_version {
            debug!(version = migration.version, name = migration.name, "Applying migration");
            conn.execute_batch(migration.up)?;
            applied.push(migration.version);
        }
    }

    Ok(applied)
}
