//! Admin operations shared by the HTTP surface and the CLI.

use std::sync::Arc;
use uuid::Uuid;

use crate::agents::RunnerContext;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentState, AgentType, ExecutionState, Message, Stack, UserMessage,
};
use crate::domain::ports::{
    AgentStateRepository, MessageRepository, StackRepository, UserMessageRepository,
};

pub struct AdminService {
    ctx: Arc<RunnerContext>,
}

impl AdminService {
    pub fn new(ctx: Arc<RunnerContext>) -> Self {
        Self { ctx }
    }

    /// Create a stack and seed its four agent states.
    pub async fn create_stack(&self, participant_name: &str) -> DomainResult<Stack> {
        if participant_name.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "participant name must not be empty".to_string(),
            ));
        }

        let stack = Stack::new(participant_name.trim());
        self.ctx.stacks.create(&stack).await?;
        for agent in AgentType::ALL {
            self.ctx
                .agent_states
                .create(&AgentState::new(stack.id, agent))
                .await?;
        }
        Ok(stack)
    }

    pub async fn get_stack(&self, stack_id: Uuid) -> DomainResult<Stack> {
        self.ctx
            .stacks
            .get(stack_id)
            .await?
            .ok_or(DomainError::StackNotFound(stack_id))
    }

    pub async fn list_stacks(&self) -> DomainResult<Vec<Stack>> {
        self.ctx.stacks.list().await
    }

    /// Delete a stack; owned rows cascade.
    pub async fn delete_stack(&self, stack_id: Uuid) -> DomainResult<()> {
        self.ctx.stacks.delete(stack_id).await
    }

    pub async fn start_execution(&self, stack_id: Uuid) -> DomainResult<()> {
        self.ctx
            .stacks
            .set_execution_state(stack_id, ExecutionState::Running)
            .await
    }

    pub async fn pause_execution(&self, stack_id: Uuid) -> DomainResult<()> {
        self.ctx
            .stacks
            .set_execution_state(stack_id, ExecutionState::Paused)
            .await
    }

    pub async fn resume_execution(&self, stack_id: Uuid) -> DomainResult<()> {
        self.ctx
            .stacks
            .set_execution_state(stack_id, ExecutionState::Running)
            .await
    }

    pub async fn stop_execution(&self, stack_id: Uuid) -> DomainResult<()> {
        self.ctx
            .stacks
            .set_execution_state(stack_id, ExecutionState::Stopped)
            .await
    }

    /// Record a visitor chat message for a team.
    pub async fn send_user_message(
        &self,
        team_id: Uuid,
        sender_name: &str,
        content: &str,
    ) -> DomainResult<UserMessage> {
        // Reject chats to unknown teams up front.
        self.get_stack(team_id).await?;

        let message = UserMessage::new(team_id, sender_name, content);
        self.ctx.user_messages.create(&message).await?;
        Ok(message)
    }

    /// Visitor history with the team's replies resolved.
    pub async fn chat_history(
        &self,
        team_id: Uuid,
        limit: usize,
    ) -> DomainResult<Vec<(UserMessage, Option<Message>)>> {
        let messages = self.ctx.user_messages.history(team_id, limit).await?;
        let mut history = Vec::with_capacity(messages.len());
        for message in messages {
            let reply = match message.response_id {
                Some(response_id) => self.ctx.messages.get(response_id).await?,
                None => None,
            };
            history.push((message, reply));
        }
        Ok(history)
    }
}
