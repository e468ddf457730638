//! SQLite implementation of the AgentStateRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentMemory, AgentRunState, AgentState, AgentType, Thought};
use crate::domain::ports::AgentStateRepository;

use super::{parse_timestamp, parse_uuid};

#[derive(Clone)]
pub struct SqliteAgentStateRepository {
    pool: SqlitePool,
}

impl SqliteAgentStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AgentStateRow {
    id: String,
    stack_id: String,
    agent_type: String,
    run_state: String,
    current_work: Option<String>,
    memory: String,
    context: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AgentStateRow> for AgentState {
    type Error = DomainError;

    fn try_from(row: AgentStateRow) -> Result<Self, Self::Error> {
        let memory: AgentMemory = serde_json::from_str(&row.memory)?;
        let context: Vec<Thought> = serde_json::from_str(&row.context)?;
        Ok(AgentState {
            id: parse_uuid(&row.id)?,
            stack_id: parse_uuid(&row.stack_id)?,
            agent_type: AgentType::from_str(&row.agent_type).ok_or_else(|| {
                DomainError::ValidationFailed(format!("bad agent type: {}", row.agent_type))
            })?,
            run_state: AgentRunState::from_str(&row.run_state).ok_or_else(|| {
                DomainError::ValidationFailed(format!("bad run state: {}", row.run_state))
            })?,
            current_work: row.current_work,
            memory,
            context,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl AgentStateRepository for SqliteAgentStateRepository {
    async fn create(&self, state: &AgentState) -> DomainResult<()> {
        let memory_json = serde_json::to_string(&state.memory)?;
        let context_json = serde_json::to_string(&state.context)?;

        sqlx::query(
            r#"INSERT INTO agent_states (id, stack_id, agent_type, run_state,
               current_work, memory, context, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(state.id.to_string())
        .bind(state.stack_id.to_string())
        .bind(state.agent_type.as_str())
        .bind(state.run_state.as_str())
        .bind(&state.current_work)
        .bind(&memory_json)
        .bind(&context_json)
        .bind(state.created_at.to_rfc3339())
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, stack_id: Uuid, agent: AgentType) -> DomainResult<Option<AgentState>> {
        let row: Option<AgentStateRow> =
            sqlx::query_as("SELECT * FROM agent_states WHERE stack_id = ? AND agent_type = ?")
                .bind(stack_id.to_string())
                .bind(agent.as_str())
                .fetch_optional(&self.pool)
                .await?;

        row.map(AgentState::try_from).transpose()
    }

    async fn list_for_stack(&self, stack_id: Uuid) -> DomainResult<Vec<AgentState>> {
        let rows: Vec<AgentStateRow> =
            sqlx::query_as("SELECT * FROM agent_states WHERE stack_id = ? ORDER BY agent_type")
                .bind(stack_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(AgentState::try_from).collect()
    }

    async fn update(&self, state: &AgentState) -> DomainResult<()> {
        let memory_json = serde_json::to_string(&state.memory)?;
        let context_json = serde_json::to_string(&state.context)?;

        let result = sqlx::query(
            r#"UPDATE agent_states SET run_state = ?, current_work = ?,
               memory = ?, context = ?, updated_at = ?
               WHERE stack_id = ? AND agent_type = ?"#,
        )
        .bind(state.run_state.as_str())
        .bind(&state.current_work)
        .bind(&memory_json)
        .bind(&context_json)
        .bind(Utc::now().to_rfc3339())
        .bind(state.stack_id.to_string())
        .bind(state.agent_type.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::AgentStateNotFound {
                stack_id: state.stack_id,
                agent: state.agent_type.as_str().to_string(),
            });
        }
        Ok(())
    }

    async fn set_run_state(
        &self,
        stack_id: Uuid,
        agent: AgentType,
        run_state: AgentRunState,
        current_work: Option<String>,
    ) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE agent_states SET run_state = ?, current_work = ?, updated_at = ?
               WHERE stack_id = ? AND agent_type = ?"#,
        )
        .bind(run_state.as_str())
        .bind(&current_work)
        .bind(Utc::now().to_rfc3339())
        .bind(stack_id.to_string())
        .bind(agent.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::AgentStateNotFound {
                stack_id,
                agent: agent.as_str().to_string(),
            });
        }
        Ok(())
    }
}
