//! Agent state repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentRunState, AgentState, AgentType};

/// Repository interface for per-(stack, role) agent state.
#[async_trait]
pub trait AgentStateRepository: Send + Sync {
    /// Create an agent state row.
    async fn create(&self, state: &AgentState) -> DomainResult<()>;

    /// Get the state for one agent of a stack.
    async fn get(&self, stack_id: Uuid, agent: AgentType) -> DomainResult<Option<AgentState>>;

    /// All four agent states of a stack.
    async fn list_for_stack(&self, stack_id: Uuid) -> DomainResult<Vec<AgentState>>;

    /// Persist memory, context, run state and current work.
    async fn update(&self, state: &AgentState) -> DomainResult<()>;

    /// Fast path for the executor's node guards: flip the run state and
    /// current-work label without touching memory.
    async fn set_run_state(
        &self,
        stack_id: Uuid,
        agent: AgentType,
        run_state: AgentRunState,
        current_work: Option<String>,
    ) -> DomainResult<()>;
}
