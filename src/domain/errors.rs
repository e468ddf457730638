//! Domain errors for the stackhive system.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the stackhive system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Stack not found: {0}")]
    StackNotFound(Uuid),

    #[error("Agent state not found for stack {stack_id}: {agent}")]
    AgentStateNotFound { stack_id: Uuid, agent: String },

    #[error("Todo not found: {0}")]
    TodoNotFound(Uuid),

    #[error("Message not found: {0}")]
    MessageNotFound(Uuid),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("LLM provider {provider} failed: {message}")]
    LlmProvider { provider: String, message: String },

    #[error("All LLM providers exhausted, last error: {last_error}")]
    LlmUnavailable { last_error: String },

    #[error("Structured output did not match the requested schema: {0}")]
    StructuredOutput(String),

    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
