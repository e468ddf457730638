//! Message and user-message repository ports.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Message, UserMessage};

/// Repository interface for peer messages shared across stacks.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Create a message.
    async fn create(&self, message: &Message) -> DomainResult<()>;

    /// Get a message with its read set loaded.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Message>>;

    /// Messages addressed to or broadcast at a stack that the stack has
    /// not read and did not send itself.
    async fn unread_for_stack(&self, stack_id: Uuid) -> DomainResult<Vec<Message>>;

    /// Mark a message read by a stack. Idempotent: marking twice leaves
    /// the read set unchanged.
    async fn mark_read(&self, message_id: Uuid, stack_id: Uuid) -> DomainResult<()>;

    /// Direct messages sent to a stack, newest first.
    async fn recent_direct_to(&self, stack_id: Uuid, limit: usize) -> DomainResult<Vec<Message>>;
}

/// Repository interface for visitor chat messages.
#[async_trait]
pub trait UserMessageRepository: Send + Sync {
    /// Create a visitor message.
    async fn create(&self, message: &UserMessage) -> DomainResult<()>;

    /// Get a visitor message by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<UserMessage>>;

    /// Unprocessed messages for a team, oldest first.
    async fn list_unprocessed(&self, team_id: Uuid) -> DomainResult<Vec<UserMessage>>;

    /// Mark one message processed, linking the reply that answered it.
    async fn mark_processed(&self, id: Uuid, response_id: Uuid) -> DomainResult<()>;

    /// Full visitor history for a team, oldest first, capped at `limit`.
    async fn history(&self, team_id: Uuid, limit: usize) -> DomainResult<Vec<UserMessage>>;
}
