//! SQLite implementation of the StackRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ExecutionState, Stack, StackPhase};
use crate::domain::ports::StackRepository;

use super::{parse_timestamp, parse_uuid};

#[derive(Clone)]
pub struct SqliteStackRepository {
    pool: SqlitePool,
}

impl SqliteStackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct StackRow {
    id: String,
    participant_name: String,
    phase: String,
    execution_state: String,
    last_activity_at: Option<String>,
    total_cycles: i64,
    created_at: String,
}

impl TryFrom<StackRow> for Stack {
    type Error = DomainError;

    fn try_from(row: StackRow) -> Result<Self, Self::Error> {
        Ok(Stack {
            id: parse_uuid(&row.id)?,
            participant_name: row.participant_name,
            phase: StackPhase::from_str(&row.phase)
                .ok_or_else(|| DomainError::ValidationFailed(format!("bad phase: {}", row.phase)))?,
            execution_state: ExecutionState::from_str(&row.execution_state).ok_or_else(|| {
                DomainError::ValidationFailed(format!(
                    "bad execution state: {}",
                    row.execution_state
                ))
            })?,
            last_activity_at: row
                .last_activity_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            total_cycles: u64::try_from(row.total_cycles).unwrap_or(0),
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[async_trait]
impl StackRepository for SqliteStackRepository {
    async fn create(&self, stack: &Stack) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO stacks (id, participant_name, phase, execution_state,
               last_activity_at, total_cycles, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(stack.id.to_string())
        .bind(&stack.participant_name)
        .bind(stack.phase.as_str())
        .bind(stack.execution_state.as_str())
        .bind(stack.last_activity_at.map(|t| t.to_rfc3339()))
        .bind(stack.total_cycles as i64)
        .bind(stack.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Stack>> {
        let row: Option<StackRow> = sqlx::query_as("SELECT * FROM stacks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Stack::try_from).transpose()
    }

    async fn list(&self) -> DomainResult<Vec<Stack>> {
        let rows: Vec<StackRow> = sqlx::query_as("SELECT * FROM stacks ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Stack::try_from).collect()
    }

    async fn list_by_execution_state(&self, state: ExecutionState) -> DomainResult<Vec<Stack>> {
        let rows: Vec<StackRow> =
            sqlx::query_as("SELECT * FROM stacks WHERE execution_state = ? ORDER BY created_at")
                .bind(state.as_str())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Stack::try_from).collect()
    }

    async fn set_execution_state(&self, id: Uuid, state: ExecutionState) -> DomainResult<()> {
        let current = self.get(id).await?.ok_or(DomainError::StackNotFound(id))?;
        if current.execution_state == state {
            return Ok(());
        }
        if !current.execution_state.can_transition_to(state) {
            return Err(DomainError::InvalidStateTransition {
                from: current.execution_state.as_str().to_string(),
                to: state.as_str().to_string(),
            });
        }

        sqlx::query("UPDATE stacks SET execution_state = ? WHERE id = ?")
            .bind(state.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_phase(&self, id: Uuid, phase: StackPhase) -> DomainResult<()> {
        let result = sqlx::query("UPDATE stacks SET phase = ? WHERE id = ?")
            .bind(phase.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::StackNotFound(id));
        }
        Ok(())
    }

    async fn touch_activity(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<()> {
        let result = sqlx::query("UPDATE stacks SET last_activity_at = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::StackNotFound(id));
        }
        Ok(())
    }

    async fn increment_cycles(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("UPDATE stacks SET total_cycles = total_cycles + 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::StackNotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM stacks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::StackNotFound(id));
        }
        Ok(())
    }
}
