//! SQLite implementation of the ExecutionRepository.
//!
//! The `running` execution row is the per-stack single-flight lease.
//! `try_begin` re-checks the latest row and inserts inside one
//! transaction; SQLite's single-writer serialization makes that a
//! compare-and-set, so two scheduler ticks cannot both acquire it.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CycleDecision, CycleStatus, ExecutionGraphRecord, GraphSummary, OrchestratorExecution,
    WorkDetectionCache, WorkStatus,
};
use crate::domain::ports::ExecutionRepository;

use super::{parse_timestamp, parse_uuid};

#[derive(Clone)]
pub struct SqliteExecutionRepository {
    pool: SqlitePool,
}

impl SqliteExecutionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ExecutionRow {
    id: String,
    stack_id: String,
    status: String,
    started_at: String,
    completed_at: Option<String>,
    decision: Option<String>,
    pause_duration_ms: Option<i64>,
    graph_summary: Option<String>,
    error: Option<String>,
}

impl TryFrom<ExecutionRow> for OrchestratorExecution {
    type Error = DomainError;

    fn try_from(row: ExecutionRow) -> Result<Self, Self::Error> {
        let decision: Option<CycleDecision> = row
            .decision
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let graph_summary: Option<GraphSummary> = row
            .graph_summary
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(OrchestratorExecution {
            id: parse_uuid(&row.id)?,
            stack_id: parse_uuid(&row.stack_id)?,
            status: CycleStatus::from_str(&row.status).ok_or_else(|| {
                DomainError::ValidationFailed(format!("bad cycle status: {}", row.status))
            })?,
            started_at: parse_timestamp(&row.started_at)?,
            completed_at: row
                .completed_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            decision,
            pause_duration_ms: row.pause_duration_ms.map(|v| u64::try_from(v).unwrap_or(0)),
            graph_summary,
            error: row.error,
        })
    }
}

#[async_trait]
impl ExecutionRepository for SqliteExecutionRepository {
    async fn latest(&self, stack_id: Uuid) -> DomainResult<Option<OrchestratorExecution>> {
        let row: Option<ExecutionRow> = sqlx::query_as(
            r#"SELECT * FROM orchestrator_executions WHERE stack_id = ?
               ORDER BY started_at DESC, id DESC LIMIT 1"#,
        )
        .bind(stack_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrchestratorExecution::try_from).transpose()
    }

    async fn try_begin(
        &self,
        stack_id: Uuid,
        stale_after: Duration,
    ) -> DomainResult<Option<OrchestratorExecution>> {
        let mut tx = self.pool.begin().await?;

        let latest: Option<ExecutionRow> = sqlx::query_as(
            r#"SELECT * FROM orchestrator_executions WHERE stack_id = ?
               ORDER BY started_at DESC, id DESC LIMIT 1"#,
        )
        .bind(stack_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;

        let now = Utc::now();
        if let Some(row) = latest {
            let latest = OrchestratorExecution::try_from(row)?;
            if latest.status == CycleStatus::Running && latest.age(now) <= stale_after {
                // Lease held by a live cycle.
                tx.rollback().await?;
                return Ok(None);
            }
        }

        let execution = OrchestratorExecution::begin(stack_id);
        sqlx::query(
            r#"INSERT INTO orchestrator_executions (id, stack_id, status, started_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(execution.id.to_string())
        .bind(execution.stack_id.to_string())
        .bind(execution.status.as_str())
        .bind(execution.started_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(execution))
    }

    async fn finalize(&self, execution: &OrchestratorExecution) -> DomainResult<()> {
        let decision_json = execution
            .decision
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let summary_json = execution
            .graph_summary
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"UPDATE orchestrator_executions SET status = ?, completed_at = ?,
               decision = ?, pause_duration_ms = ?, graph_summary = ?, error = ?
               WHERE id = ?"#,
        )
        .bind(execution.status.as_str())
        .bind(execution.completed_at.map(|t| t.to_rfc3339()))
        .bind(decision_json)
        .bind(execution.pause_duration_ms.map(|v| v as i64))
        .bind(summary_json)
        .bind(&execution.error)
        .bind(execution.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ExecutionNotFound(execution.id));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<OrchestratorExecution>> {
        let row: Option<ExecutionRow> =
            sqlx::query_as("SELECT * FROM orchestrator_executions WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(OrchestratorExecution::try_from).transpose()
    }

    async fn recent(
        &self,
        stack_id: Uuid,
        limit: usize,
    ) -> DomainResult<Vec<OrchestratorExecution>> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(
            r#"SELECT * FROM orchestrator_executions WHERE stack_id = ?
               ORDER BY started_at DESC, id DESC LIMIT ?"#,
        )
        .bind(stack_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(OrchestratorExecution::try_from)
            .collect()
    }

    async fn within_window(
        &self,
        stack_id: Uuid,
        window: Duration,
    ) -> DomainResult<Vec<OrchestratorExecution>> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::hours(1));
        let rows: Vec<ExecutionRow> = sqlx::query_as(
            r#"SELECT * FROM orchestrator_executions
               WHERE stack_id = ? AND started_at >= ?
               ORDER BY started_at"#,
        )
        .bind(stack_id.to_string())
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(OrchestratorExecution::try_from)
            .collect()
    }

    async fn record_graph(&self, record: &ExecutionGraphRecord) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO execution_graphs (id, stack_id, execution_id, graph, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(record.stack_id.to_string())
        .bind(record.execution_id.to_string())
        .bind(serde_json::to_string(&record.graph)?)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_graphs(
        &self,
        stack_id: Uuid,
        limit: usize,
    ) -> DomainResult<Vec<ExecutionGraphRecord>> {
        let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
            r#"SELECT id, stack_id, execution_id, graph, created_at FROM execution_graphs
               WHERE stack_id = ? ORDER BY created_at DESC LIMIT ?"#,
        )
        .bind(stack_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, stack_id, execution_id, graph, created_at)| {
                Ok(ExecutionGraphRecord {
                    id: parse_uuid(&id)?,
                    stack_id: parse_uuid(&stack_id)?,
                    execution_id: parse_uuid(&execution_id)?,
                    graph: serde_json::from_str(&graph)?,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    async fn get_work_cache(&self, stack_id: Uuid) -> DomainResult<Option<WorkDetectionCache>> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT status, computed_at, valid_until FROM work_detection_cache WHERE stack_id = ?",
        )
        .bind(stack_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((status, computed_at, valid_until)) => {
                let status: WorkStatus = serde_json::from_str(&status)?;
                Ok(Some(WorkDetectionCache {
                    stack_id,
                    status,
                    computed_at: parse_timestamp(&computed_at)?,
                    valid_until: parse_timestamp(&valid_until)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn put_work_cache(&self, cache: &WorkDetectionCache) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO work_detection_cache (stack_id, status, computed_at, valid_until)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(stack_id) DO UPDATE SET
                   status = excluded.status,
                   computed_at = excluded.computed_at,
                   valid_until = excluded.valid_until"#,
        )
        .bind(cache.stack_id.to_string())
        .bind(serde_json::to_string(&cache.status)?)
        .bind(cache.computed_at.to_rfc3339())
        .bind(cache.valid_until.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
