//! SQLite adapters: connection management, migrations and repositories.

pub mod agent_state_repository;
pub mod artifact_repository;
pub mod connection;
pub mod execution_repository;
pub mod message_repository;
pub mod schema;
pub mod stack_repository;
pub mod todo_repository;

pub use agent_state_repository::SqliteAgentStateRepository;
pub use artifact_repository::{
    SqliteArtifactRepository, SqliteProjectIdeaRepository, SqliteTraceRepository,
};
pub use connection::{open, open_memory, StoreError};
pub use execution_repository::SqliteExecutionRepository;
pub use message_repository::{SqliteMessageRepository, SqliteUserMessageRepository};
pub use schema::{apply_schema, create_seeded_test_pool, SchemaError, SCHEMA_VERSION};
pub use stack_repository::SqliteStackRepository;
pub use todo_repository::SqliteTodoRepository;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Parse a stored UUID column.
pub(crate) fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DomainError::ValidationFailed(format!("bad uuid {s}: {e}")))
}

/// Parse a stored RFC 3339 timestamp column.
pub(crate) fn parse_timestamp(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::ValidationFailed(format!("bad timestamp {s}: {e}")))
}
