//! Stack repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ExecutionState, Stack, StackPhase};

/// Repository interface for Stack persistence.
#[async_trait]
pub trait StackRepository: Send + Sync {
    /// Create a new stack.
    async fn create(&self, stack: &Stack) -> DomainResult<()>;

    /// Get a stack by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Stack>>;

    /// List all stacks, newest first.
    async fn list(&self) -> DomainResult<Vec<Stack>>;

    /// List stacks in a given execution state.
    async fn list_by_execution_state(&self, state: ExecutionState) -> DomainResult<Vec<Stack>>;

    /// Set the execution state. Fails on invalid operator transitions.
    async fn set_execution_state(&self, id: Uuid, state: ExecutionState) -> DomainResult<()>;

    /// Set the hackathon phase.
    async fn set_phase(&self, id: Uuid, phase: StackPhase) -> DomainResult<()>;

    /// Bump `last_activity_at`.
    async fn touch_activity(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<()>;

    /// Increment `total_cycles` by one.
    async fn increment_cycles(&self, id: Uuid) -> DomainResult<()>;

    /// Delete a stack; child rows cascade.
    async fn delete(&self, id: Uuid) -> DomainResult<()>;
}
