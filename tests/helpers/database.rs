//! In-memory database setup for integration tests.

use sqlx::SqlitePool;

use stackhive::adapters::sqlite::create_seeded_test_pool;

/// Create an in-memory SQLite database with the full schema applied.
#[allow(dead_code)]
pub async fn setup_test_db() -> SqlitePool {
    create_seeded_test_pool()
        .await
        .expect("failed to create seeded test pool")
}

/// Teardown test database.
#[allow(dead_code)]
pub async fn teardown_test_db(pool: SqlitePool) {
    pool.close().await;
}
