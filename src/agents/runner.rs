//! Shared agent runner skeleton.
//!
//! Every runner follows the same shape: load scoped state, re-check
//! preconditions, call the gateway with the role schema, apply a bounded
//! set of mutations, update memory, append a trace.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::adapters::llm::LlmGateway;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentTrace, AgentType, ChatOptions};
use crate::domain::ports::{
    AgentStateRepository, ArtifactRepository, MessageRepository, ProjectIdeaRepository,
    StackRepository, TodoRepository, TraceRepository, UserMessageRepository,
};

/// Everything a runner needs: repositories, the gateway, and timeouts.
pub struct RunnerContext {
    pub stacks: Arc<dyn StackRepository>,
    pub agent_states: Arc<dyn AgentStateRepository>,
    pub todos: Arc<dyn TodoRepository>,
    pub projects: Arc<dyn ProjectIdeaRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub user_messages: Arc<dyn UserMessageRepository>,
    pub artifacts: Arc<dyn ArtifactRepository>,
    pub traces: Arc<dyn TraceRepository>,
    pub gateway: Arc<LlmGateway>,
    /// Default LLM deadline; the builder gets `builder_llm_timeout`.
    pub llm_timeout: Duration,
    pub builder_llm_timeout: Duration,
}

impl RunnerContext {
    /// Role-tuned chat options: temperature per role, a larger token and
    /// time budget for the builder.
    pub fn chat_options_for(&self, agent: AgentType) -> ChatOptions {
        let options = ChatOptions::default();
        match agent {
            AgentType::Planner => options.with_temperature(0.7).with_timeout(self.llm_timeout),
            AgentType::Builder => options
                .with_temperature(0.4)
                .with_max_tokens(16384)
                .with_timeout(self.builder_llm_timeout),
            AgentType::Communicator => {
                options.with_temperature(0.8).with_timeout(self.llm_timeout)
            }
            AgentType::Reviewer => options.with_temperature(0.3).with_timeout(self.llm_timeout),
        }
    }

    /// Append a trace for one agent step.
    pub async fn trace(
        &self,
        stack_id: Uuid,
        agent: AgentType,
        thought: &str,
        action: &str,
        result: &str,
    ) -> DomainResult<()> {
        self.traces
            .append(&AgentTrace::new(stack_id, agent, thought, action, result))
            .await
    }
}

/// How a runner invocation ended, short of an error.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The agent did its work.
    Ran { action: String, result: String },
    /// Preconditions no longer held; nothing was mutated.
    Skipped { reason: String },
}

impl RunOutcome {
    pub fn ran(action: impl Into<String>, result: impl Into<String>) -> Self {
        Self::Ran {
            action: action.into(),
            result: result.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

/// One agent role's executable body.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    fn agent_type(&self) -> AgentType;

    /// Execute one invocation for a stack. `reason` is the work detector's
    /// explanation for why this agent was scheduled.
    async fn run(&self, stack_id: Uuid, reason: &str) -> DomainResult<RunOutcome>;
}

/// Parse a structured LLM reply, mapping malformed output to the
/// structured-output error kind.
pub fn parse_structured<T: DeserializeOwned>(content: &str) -> DomainResult<T> {
    serde_json::from_str(content).map_err(|e| DomainError::StructuredOutput(e.to_string()))
}

/// Truncate to a character budget without splitting code points.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn test_parse_structured_maps_error_kind() {
        let ok: Sample = parse_structured("{\"value\": 3}").unwrap();
        assert_eq!(ok.value, 3);

        let err = parse_structured::<Sample>("not json").unwrap_err();
        assert!(matches!(err, DomainError::StructuredOutput(_)));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 3), "hél");
        assert_eq!(truncate_chars("ok", 10), "ok");
    }
}
