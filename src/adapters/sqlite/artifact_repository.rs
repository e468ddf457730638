//! SQLite implementations of the artifact, trace and project repositories.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentTrace, AgentType, Artifact, ProjectIdea};
use crate::domain::ports::{ArtifactRepository, ProjectIdeaRepository, TraceRepository};

use super::{parse_timestamp, parse_uuid};

#[derive(Clone)]
pub struct SqliteArtifactRepository {
    pool: SqlitePool,
}

impl SqliteArtifactRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ArtifactRow {
    id: String,
    stack_id: String,
    version: i64,
    artifact_type: String,
    content: String,
    created_by: String,
    metadata: String,
    created_at: String,
}

impl TryFrom<ArtifactRow> for Artifact {
    type Error = DomainError;

    fn try_from(row: ArtifactRow) -> Result<Self, Self::Error> {
        Ok(Artifact {
            id: parse_uuid(&row.id)?,
            stack_id: parse_uuid(&row.stack_id)?,
            version: row.version,
            artifact_type: row.artifact_type,
            content: row.content,
            created_by: AgentType::from_str(&row.created_by).ok_or_else(|| {
                DomainError::ValidationFailed(format!("bad creator: {}", row.created_by))
            })?,
            metadata: serde_json::from_str(&row.metadata)?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl SqliteArtifactRepository {
    async fn try_append(&self, artifact: &Artifact) -> DomainResult<Artifact> {
        // Version assignment and insert share one transaction so versions
        // stay strictly monotonic even if two writers race; a loser trips
        // the (stack_id, version) unique constraint.
        let mut tx = self.pool.begin().await?;

        let (current,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM artifacts WHERE stack_id = ?")
                .bind(artifact.stack_id.to_string())
                .fetch_one(&mut *tx)
                .await?;

        let mut stored = artifact.clone();
        stored.version = current + 1;
        stored.created_at = Utc::now();

        sqlx::query(
            r#"INSERT INTO artifacts (id, stack_id, version, artifact_type,
               content, created_by, metadata, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(stored.id.to_string())
        .bind(stored.stack_id.to_string())
        .bind(stored.version)
        .bind(&stored.artifact_type)
        .bind(&stored.content)
        .bind(stored.created_by.as_str())
        .bind(serde_json::to_string(&stored.metadata)?)
        .bind(stored.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed") => {
                DomainError::ConcurrencyConflict {
                    entity: "artifact".to_string(),
                    id: stored.stack_id.to_string(),
                }
            }
            _ => DomainError::from(e),
        })?;

        tx.commit().await?;
        Ok(stored)
    }
}

#[async_trait]
impl ArtifactRepository for SqliteArtifactRepository {
    async fn append(&self, artifact: &Artifact) -> DomainResult<Artifact> {
        // One retry on a version race; beyond that the conflict surfaces.
        match self.try_append(artifact).await {
            Err(DomainError::ConcurrencyConflict { .. }) => self.try_append(artifact).await,
            other => other,
        }
    }

    async fn latest(&self, stack_id: Uuid) -> DomainResult<Option<Artifact>> {
        let row: Option<ArtifactRow> = sqlx::query_as(
            "SELECT * FROM artifacts WHERE stack_id = ? ORDER BY version DESC LIMIT 1",
        )
        .bind(stack_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Artifact::try_from).transpose()
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Artifact>> {
        let row: Option<ArtifactRow> = sqlx::query_as("SELECT * FROM artifacts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Artifact::try_from).transpose()
    }

    async fn list_for_stack(&self, stack_id: Uuid, limit: usize) -> DomainResult<Vec<Artifact>> {
        let rows: Vec<ArtifactRow> = sqlx::query_as(
            "SELECT * FROM artifacts WHERE stack_id = ? ORDER BY version DESC LIMIT ?",
        )
        .bind(stack_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Artifact::try_from).collect()
    }
}

#[derive(Clone)]
pub struct SqliteTraceRepository {
    pool: SqlitePool,
}

impl SqliteTraceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TraceRow {
    id: String,
    stack_id: String,
    agent_type: String,
    thought: String,
    action: String,
    result: String,
    created_at: String,
}

impl TryFrom<TraceRow> for AgentTrace {
    type Error = DomainError;

    fn try_from(row: TraceRow) -> Result<Self, Self::Error> {
        Ok(AgentTrace {
            id: parse_uuid(&row.id)?,
            stack_id: parse_uuid(&row.stack_id)?,
            agent_type: AgentType::from_str(&row.agent_type).ok_or_else(|| {
                DomainError::ValidationFailed(format!("bad agent type: {}", row.agent_type))
            })?,
            thought: row.thought,
            action: row.action,
            result: row.result,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[async_trait]
impl TraceRepository for SqliteTraceRepository {
    async fn append(&self, trace: &AgentTrace) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO agent_traces (id, stack_id, agent_type, thought,
               action, result, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(trace.id.to_string())
        .bind(trace.stack_id.to_string())
        .bind(trace.agent_type.as_str())
        .bind(&trace.thought)
        .bind(&trace.action)
        .bind(&trace.result)
        .bind(trace.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, stack_id: Uuid, limit: usize) -> DomainResult<Vec<AgentTrace>> {
        let rows: Vec<TraceRow> = sqlx::query_as(
            "SELECT * FROM agent_traces WHERE stack_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(stack_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AgentTrace::try_from).collect()
    }
}

#[derive(Clone)]
pub struct SqliteProjectIdeaRepository {
    pool: SqlitePool,
}

impl SqliteProjectIdeaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProjectIdeaRow {
    id: String,
    stack_id: String,
    title: String,
    description: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ProjectIdeaRow> for ProjectIdea {
    type Error = DomainError;

    fn try_from(row: ProjectIdeaRow) -> Result<Self, Self::Error> {
        Ok(ProjectIdea {
            id: parse_uuid(&row.id)?,
            stack_id: parse_uuid(&row.stack_id)?,
            title: row.title,
            description: row.description,
            status: row.status,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl ProjectIdeaRepository for SqliteProjectIdeaRepository {
    async fn upsert(&self, idea: &ProjectIdea) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO project_ideas (id, stack_id, title, description, status,
               created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(stack_id) DO UPDATE SET
                   title = excluded.title,
                   description = excluded.description,
                   status = excluded.status,
                   updated_at = excluded.updated_at"#,
        )
        .bind(idea.id.to_string())
        .bind(idea.stack_id.to_string())
        .bind(&idea.title)
        .bind(&idea.description)
        .bind(&idea.status)
        .bind(idea.created_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_for_stack(&self, stack_id: Uuid) -> DomainResult<Option<ProjectIdea>> {
        let row: Option<ProjectIdeaRow> =
            sqlx::query_as("SELECT * FROM project_ideas WHERE stack_id = ?")
                .bind(stack_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(ProjectIdea::try_from).transpose()
    }
}
