//! SQLite implementation of the TodoRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentType, Todo, TodoStatus};
use crate::domain::ports::TodoRepository;

use super::{parse_timestamp, parse_uuid};

#[derive(Clone)]
pub struct SqliteTodoRepository {
    pool: SqlitePool,
}

impl SqliteTodoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TodoRow {
    id: String,
    stack_id: String,
    content: String,
    status: String,
    priority: i64,
    assigned_by: String,
    created_at: String,
    completed_at: Option<String>,
}

impl TryFrom<TodoRow> for Todo {
    type Error = DomainError;

    fn try_from(row: TodoRow) -> Result<Self, Self::Error> {
        Ok(Todo {
            id: parse_uuid(&row.id)?,
            stack_id: parse_uuid(&row.stack_id)?,
            content: row.content,
            status: TodoStatus::from_str(&row.status).ok_or_else(|| {
                DomainError::ValidationFailed(format!("bad todo status: {}", row.status))
            })?,
            priority: row.priority,
            assigned_by: AgentType::from_str(&row.assigned_by).ok_or_else(|| {
                DomainError::ValidationFailed(format!("bad assigner: {}", row.assigned_by))
            })?,
            created_at: parse_timestamp(&row.created_at)?,
            completed_at: row
                .completed_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
        })
    }
}

#[async_trait]
impl TodoRepository for SqliteTodoRepository {
    async fn create(&self, todo: &Todo) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO todos (id, stack_id, content, status, priority,
               assigned_by, created_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(todo.id.to_string())
        .bind(todo.stack_id.to_string())
        .bind(&todo.content)
        .bind(todo.status.as_str())
        .bind(todo.priority)
        .bind(todo.assigned_by.as_str())
        .bind(todo.created_at.to_rfc3339())
        .bind(todo.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Todo>> {
        let row: Option<TodoRow> = sqlx::query_as("SELECT * FROM todos WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Todo::try_from).transpose()
    }

    async fn update(&self, todo: &Todo) -> DomainResult<()> {
        // Completed todos must carry their completion time.
        if todo.status == TodoStatus::Completed && todo.completed_at.is_none() {
            return Err(DomainError::ValidationFailed(
                "completed todo without completed_at".to_string(),
            ));
        }

        let result = sqlx::query(
            r#"UPDATE todos SET content = ?, status = ?, priority = ?, completed_at = ?
               WHERE id = ?"#,
        )
        .bind(&todo.content)
        .bind(todo.status.as_str())
        .bind(todo.priority)
        .bind(todo.completed_at.map(|t| t.to_rfc3339()))
        .bind(todo.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TodoNotFound(todo.id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TodoNotFound(id));
        }
        Ok(())
    }

    async fn list_for_stack(
        &self,
        stack_id: Uuid,
        status: Option<TodoStatus>,
    ) -> DomainResult<Vec<Todo>> {
        let rows: Vec<TodoRow> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT * FROM todos WHERE stack_id = ? AND status = ? ORDER BY created_at",
                )
                .bind(stack_id.to_string())
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM todos WHERE stack_id = ? ORDER BY created_at")
                    .bind(stack_id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(Todo::try_from).collect()
    }

    async fn clear_for_stack(&self, stack_id: Uuid) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM todos WHERE stack_id = ?")
            .bind(stack_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn highest_priority_pending(&self, stack_id: Uuid) -> DomainResult<Option<Todo>> {
        let row: Option<TodoRow> = sqlx::query_as(
            r#"SELECT * FROM todos WHERE stack_id = ? AND status = 'pending'
               ORDER BY priority DESC, created_at ASC LIMIT 1"#,
        )
        .bind(stack_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Todo::try_from).transpose()
    }

    async fn find_by_content(&self, stack_id: Uuid, content: &str) -> DomainResult<Option<Todo>> {
        let row: Option<TodoRow> = sqlx::query_as(
            "SELECT * FROM todos WHERE stack_id = ? AND content = ? ORDER BY created_at LIMIT 1",
        )
        .bind(stack_id.to_string())
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Todo::try_from).transpose()
    }

    async fn count_completed_since(
        &self,
        stack_id: Uuid,
        since: DateTime<Utc>,
    ) -> DomainResult<u64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM todos
               WHERE stack_id = ? AND status = 'completed' AND completed_at >= ?"#,
        )
        .bind(stack_id.to_string())
        .bind(since.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}
