//! SQLite connections for the state store.
//!
//! Access pattern: every orchestrator cycle issues a burst of short reads
//! (the work snapshot runs its queries concurrently) followed by a
//! handful of short writes, and many cycles run at once. SQLite
//! serializes writers regardless, so the pool stays small and the busy
//! timeout stays well under the node budget; a cycle blocked on a
//! sibling's write must fail fast enough for the scheduler to retry it.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unusable database path {path}: {reason}")]
    BadPath { path: String, reason: String },
    #[error("Could not open database: {0}")]
    Open(#[source] sqlx::Error),
}

/// More connections than concurrent cycles buys nothing: reads are
/// sub-millisecond and writes serialize on SQLite's single writer.
const MAX_CONNECTIONS: u32 = 8;
/// Writer contention surfaces as SQLITE_BUSY. Ten seconds rides out any
/// realistic write burst while staying far below the 60 s node budget.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the on-disk store at `path`, creating the file and its parent
/// directory if missing. WAL keeps the snapshot reads of one cycle from
/// blocking another cycle's writes.
pub async fn open(path: &str) -> Result<SqlitePool, StoreError> {
    let file = Path::new(path);
    if let Some(parent) = file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::BadPath {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(file)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(StoreError::Open)
}

/// Open a private in-memory store for tests. The single connection IS
/// the database, so it must never be reaped as idle.
pub async fn open_memory() -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::new()
        .filename(":memory:")
        .shared_cache(true)
        .journal_mode(SqliteJournalMode::Memory)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(StoreError::Open)
}
