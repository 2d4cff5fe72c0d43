//! SQLite persistence: pooled connections, schema, repositories.

mod event_repository;
mod integration_repository;
pub mod schema;

use std::path::Path;

use chrono::{DateTime, Utc};
use jobtrail_domain::{CalendarError, Result};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::errors::InfraError;

pub use event_repository::SqliteEventRepository;
pub use integration_repository::SqliteIntegrationRepository;

/// Shared connection pool handed to the repositories.
pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

/// Open (or create) the database at `path`, apply pragmas, and run the
/// schema migration.
pub fn open_pool(path: &Path) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = r2d2::Pool::builder().max_size(8).build(manager).map_err(InfraError::from)?;

    let conn = pool.get().map_err(InfraError::from)?;
    schema::migrate(&conn)?;
    info!(path = %path.display(), "database ready");

    Ok(pool)
}

/// Epoch seconds for storage.
pub(crate) fn to_ts(at: DateTime<Utc>) -> i64 {
    at.timestamp()
}

/// Back from epoch seconds; a value outside chrono's range means the row
/// was corrupted outside this codebase.
pub(crate) fn from_ts(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| CalendarError::Database(format!("timestamp out of range: {ts}")))
}

/// In-memory pool for tests.
pub fn open_in_memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory();
    // A single connection keeps every test statement on the same in-memory db.
    let pool = r2d2::Pool::builder().max_size(1).build(manager).map_err(InfraError::from)?;
    let conn = pool.get().map_err(InfraError::from)?;
    schema::migrate(&conn)?;
    Ok(pool)
}
