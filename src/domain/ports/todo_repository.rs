//! Todo repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Todo, TodoStatus};

/// Repository interface for Todo persistence.
#[async_trait]
pub trait TodoRepository: Send + Sync {
    /// Create a new todo.
    async fn create(&self, todo: &Todo) -> DomainResult<()>;

    /// Get a todo by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Todo>>;

    /// Update content, status, priority and completion time.
    async fn update(&self, todo: &Todo) -> DomainResult<()>;

    /// Delete a todo.
    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    /// List a stack's todos, optionally filtered by status.
    async fn list_for_stack(
        &self,
        stack_id: Uuid,
        status: Option<TodoStatus>,
    ) -> DomainResult<Vec<Todo>>;

    /// Delete every todo of a stack; returns how many were removed.
    async fn clear_for_stack(&self, stack_id: Uuid) -> DomainResult<u64>;

    /// Highest-priority pending todo, oldest first on ties.
    async fn highest_priority_pending(&self, stack_id: Uuid) -> DomainResult<Option<Todo>>;

    /// Find a stack's todo by exact content match.
    async fn find_by_content(&self, stack_id: Uuid, content: &str) -> DomainResult<Option<Todo>>;

    /// Count todos completed at or after the given instant.
    async fn count_completed_since(
        &self,
        stack_id: Uuid,
        since: DateTime<Utc>,
    ) -> DomainResult<u64>;
}
