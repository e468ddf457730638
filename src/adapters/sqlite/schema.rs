//! Embedded schema bootstrap.
//!
//! The store ships exactly one schema, versioned through SQLite's own
//! `PRAGMA user_version` instead of a migrations table: version 0 is a
//! fresh file, version 1 is the current schema, anything newer belongs
//! to a later binary and is refused rather than guessed at.

use sqlx::SqlitePool;
use thiserror::Error;

use super::connection::{open_memory, StoreError};

/// Schema version this binary reads and writes.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = include_str!("../../../migrations/001_initial_schema.sql");

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to apply schema: {0}")]
    Apply(#[source] sqlx::Error),
    #[error("Failed to read schema version: {0}")]
    VersionRead(#[source] sqlx::Error),
    #[error("Database schema is version {found}, newer than this binary's {SCHEMA_VERSION}")]
    TooNew { found: i64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read the store's schema version.
pub async fn current_version(pool: &SqlitePool) -> Result<i64, SchemaError> {
    let (version,): (i64,) = sqlx::query_as("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(SchemaError::VersionRead)?;
    Ok(version)
}

/// Bring a fresh store up to the current schema. Returns whether the
/// schema was applied by this call; an already-current store is a no-op.
pub async fn apply_schema(pool: &SqlitePool) -> Result<bool, SchemaError> {
    match current_version(pool).await? {
        0 => {
            let mut tx = pool.begin().await.map_err(SchemaError::Apply)?;
            sqlx::raw_sql(SCHEMA_SQL)
                .execute(&mut *tx)
                .await
                .map_err(SchemaError::Apply)?;
            // PRAGMA takes no bind parameters; the version is a const.
            sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
                .execute(&mut *tx)
                .await
                .map_err(SchemaError::Apply)?;
            tx.commit().await.map_err(SchemaError::Apply)?;
            Ok(true)
        }
        SCHEMA_VERSION => Ok(false),
        found => Err(SchemaError::TooNew { found }),
    }
}

/// In-memory pool with the schema applied, for tests.
pub async fn create_seeded_test_pool() -> Result<SqlitePool, SchemaError> {
    let pool = open_memory().await?;
    apply_schema(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_applies_once() {
        let pool = open_memory().await.unwrap();
        assert_eq!(current_version(&pool).await.unwrap(), 0);

        assert!(apply_schema(&pool).await.unwrap());
        assert_eq!(current_version(&pool).await.unwrap(), SCHEMA_VERSION);

        // Second call is a no-op.
        assert!(!apply_schema(&pool).await.unwrap());
    }

    #[tokio::test]
    async fn test_newer_schema_refused() {
        let pool = open_memory().await.unwrap();
        sqlx::query("PRAGMA user_version = 99")
            .execute(&pool)
            .await
            .unwrap();

        let err = apply_schema(&pool).await.unwrap_err();
        assert!(matches!(err, SchemaError::TooNew { found: 99 }));
    }

    #[tokio::test]
    async fn test_seeded_pool_has_tables() {
        let pool = create_seeded_test_pool().await.unwrap();
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'stacks'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }
}
