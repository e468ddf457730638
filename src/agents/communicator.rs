//! Communicator agent runner.
//!
//! Answers exactly one visitor message per invocation, or replies to
//! unread peer messages. Never sends unsolicited broadcasts.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::agents::runner::{parse_structured, AgentRunner, RunOutcome, RunnerContext};
use crate::agents::schemas::communicator_schema;
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    AgentMemory, AgentType, ChatMessage, Message, MessageType, UserMessage,
};
use crate::domain::ports::{
    AgentStateRepository, MessageRepository, ProjectIdeaRepository, UserMessageRepository,
};

/// Structured communicator reply.
#[derive(Debug, Deserialize)]
pub struct CommunicatorOutput {
    pub thinking: String,
    pub results: CommunicatorResults,
}

#[derive(Debug, Deserialize)]
pub struct CommunicatorResults {
    pub message: String,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(rename = "type")]
    pub message_type: String,
}

pub struct CommunicatorRunner {
    ctx: Arc<RunnerContext>,
}

impl CommunicatorRunner {
    pub fn new(ctx: Arc<RunnerContext>) -> Self {
        Self { ctx }
    }

    async fn project_blurb(&self, stack_id: Uuid) -> DomainResult<String> {
        Ok(match self.ctx.projects.get_for_stack(stack_id).await? {
            Some(idea) => format!("Your team is building: {} - {}", idea.title, idea.description),
            None => "Your team has not settled on a project yet.".to_string(),
        })
    }

    /// Answer the oldest unprocessed visitor message.
    async fn answer_visitor(
        &self,
        stack_id: Uuid,
        visitor: &UserMessage,
    ) -> DomainResult<RunOutcome> {
        let blurb = self.project_blurb(stack_id).await?;
        let messages = vec![
            ChatMessage::system(
                "You are the communicator of a hackathon team. A visitor is chatting with \
                 your booth. Reply warmly and concretely. Your reply type must be 'direct'.",
            ),
            ChatMessage::user(format!(
                "{blurb}\n\nVisitor {} says: {}\n\nCompose your reply.",
                visitor.sender_name, visitor.content
            )),
        ];
        let options = self
            .ctx
            .chat_options_for(AgentType::Communicator)
            .with_structured(communicator_schema());

        let response = self.ctx.gateway.chat(&messages, &options).await?;
        let output: CommunicatorOutput = parse_structured(&response.content)?;

        // Visitor replies are always direct, whatever the model claimed.
        // The recipient is a human, not a stack, so there is no to_stack_id;
        // the user message's response_id is the link visitors read back.
        let reply = Message {
            id: Uuid::new_v4(),
            from_stack_id: Some(stack_id),
            to_stack_id: None,
            message_type: MessageType::Direct,
            content: output.results.message.clone(),
            read_by: Vec::new(),
            created_at: Utc::now(),
        };
        self.ctx.messages.create(&reply).await?;
        self.ctx
            .user_messages
            .mark_processed(visitor.id, reply.id)
            .await?;

        self.bump_memory(stack_id, &output.thinking, true).await?;

        let action = format!("reply to visitor {}", visitor.sender_name);
        self.ctx
            .trace(stack_id, AgentType::Communicator, &output.thinking, &action, "processed=1")
            .await?;

        Ok(RunOutcome::ran(action, "answered one visitor message"))
    }

    /// Reply to unread peer messages and mark them all read.
    async fn answer_peers(
        &self,
        stack_id: Uuid,
        unread: &[Message],
    ) -> DomainResult<RunOutcome> {
        let blurb = self.project_blurb(stack_id).await?;
        let mut digest = String::new();
        for msg in unread {
            digest.push_str(&format!(
                "- [{}] {}\n",
                msg.message_type.as_str(),
                msg.content
            ));
        }

        let messages = vec![
            ChatMessage::system(
                "You are the communicator of a hackathon team. Other teams have messaged \
                 you. Compose one reply; choose 'direct' to answer the most relevant \
                 sender or 'broadcast' to address the whole floor.",
            ),
            ChatMessage::user(format!(
                "{blurb}\n\nUnread messages:\n{digest}\nCompose your reply."
            )),
        ];
        let options = self
            .ctx
            .chat_options_for(AgentType::Communicator)
            .with_structured(communicator_schema());

        let response = self.ctx.gateway.chat(&messages, &options).await?;
        let output: CommunicatorOutput = parse_structured(&response.content)?;

        let reply = match output.results.message_type.as_str() {
            "broadcast" => Message::broadcast(stack_id, output.results.message.clone()),
            _ => {
                // Direct the reply at the sender of the oldest unread
                // message; broadcasts without a sender fall back to a
                // broadcast reply.
                match unread.iter().find_map(|m| m.from_stack_id) {
                    Some(peer) => Message::direct(stack_id, peer, output.results.message.clone()),
                    None => Message::broadcast(stack_id, output.results.message.clone()),
                }
            }
        };
        self.ctx.messages.create(&reply).await?;

        // Everything shown to the model counts as consumed.
        for msg in unread {
            self.ctx.messages.mark_read(msg.id, stack_id).await?;
        }

        self.bump_memory(stack_id, &output.thinking, false).await?;

        let action = format!("reply to {} peer message(s)", unread.len());
        let result = format!("sent {} reply", reply.message_type.as_str());
        self.ctx
            .trace(stack_id, AgentType::Communicator, &output.thinking, &action, &result)
            .await?;

        Ok(RunOutcome::ran(action, result))
    }

    async fn bump_memory(
        &self,
        stack_id: Uuid,
        thinking: &str,
        processed_user_message: bool,
    ) -> DomainResult<()> {
        if let Some(mut state) = self
            .ctx
            .agent_states
            .get(stack_id, AgentType::Communicator)
            .await?
        {
            if let AgentMemory::Communicator(memory) = &mut state.memory {
                memory.last_message_time = Some(Utc::now());
                if processed_user_message {
                    memory.user_messages_processed += 1;
                }
            }
            state.push_thought(thinking);
            self.ctx.agent_states.update(&state).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AgentRunner for CommunicatorRunner {
    fn agent_type(&self) -> AgentType {
        AgentType::Communicator
    }

    async fn run(&self, stack_id: Uuid, _reason: &str) -> DomainResult<RunOutcome> {
        // Visitors take precedence; exactly one per cycle.
        let unprocessed = self.ctx.user_messages.list_unprocessed(stack_id).await?;
        if let Some(oldest) = unprocessed.first() {
            return self.answer_visitor(stack_id, oldest).await;
        }

        let unread = self.ctx.messages.unread_for_stack(stack_id).await?;
        if unread.is_empty() {
            return Ok(RunOutcome::skipped("no unanswered messages"));
        }
        self.answer_peers(stack_id, &unread).await
    }
}
