//! Builder agent runner.
//!
//! Works off the highest-priority pending todo and appends a new artifact
//! version. An empty artifact from the model leaves the todo in progress
//! for the planner to reconsider.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::agents::runner::{
    parse_structured, truncate_chars, AgentRunner, RunOutcome, RunnerContext,
};
use crate::agents::schemas::builder_schema;
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    AgentMemory, AgentType, Artifact, ChatMessage, TodoStatus,
};
use crate::domain::ports::{
    AgentStateRepository, ArtifactRepository, ProjectIdeaRepository, TodoRepository,
};

/// Character budget for the previous artifact in the prompt.
pub const ARTIFACT_CONTEXT_MAX_CHARS: usize = 50 * 1024;

/// Structured builder reply.
#[derive(Debug, Deserialize)]
pub struct BuilderOutput {
    pub thinking: String,
    pub results: BuilderResults,
}

#[derive(Debug, Deserialize)]
pub struct BuilderResults {
    #[serde(default)]
    pub artifact: String,
}

pub struct BuilderRunner {
    ctx: Arc<RunnerContext>,
}

impl BuilderRunner {
    pub fn new(ctx: Arc<RunnerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl AgentRunner for BuilderRunner {
    fn agent_type(&self) -> AgentType {
        AgentType::Builder
    }

    async fn run(&self, stack_id: Uuid, reason: &str) -> DomainResult<RunOutcome> {
        // Re-check: the backlog may have drained since work detection.
        let Some(mut todo) = self.ctx.todos.highest_priority_pending(stack_id).await? else {
            return Ok(RunOutcome::skipped("no pending todos"));
        };

        todo.status = TodoStatus::InProgress;
        self.ctx.todos.update(&todo).await?;

        let project = self.ctx.projects.get_for_stack(stack_id).await?;
        let latest = self.ctx.artifacts.latest(stack_id).await?;

        let mut prompt = format!("Task: {}\nScheduled because: {}\n", todo.content, reason);
        if let Some(idea) = &project {
            prompt.push_str(&format!("\nProject: {}\n{}\n", idea.title, idea.description));
        }
        match &latest {
            Some(artifact) => {
                prompt.push_str(&format!(
                    "\nCurrent artifact (version {}):\n{}\n",
                    artifact.version,
                    truncate_chars(&artifact.content, ARTIFACT_CONTEXT_MAX_CHARS)
                ));
                prompt.push_str("\nReturn the complete updated HTML document.\n");
            }
            None => prompt.push_str("\nNo artifact exists yet. Return a complete HTML document.\n"),
        }

        let messages = vec![
            ChatMessage::system(
                "You are the builder of a hackathon team. You produce one self-contained \
                 HTML file (inline CSS and JS allowed). Always return the whole document, \
                 never a diff. Return an empty artifact only if the task is impossible.",
            ),
            ChatMessage::user(prompt),
        ];
        let options = self
            .ctx
            .chat_options_for(AgentType::Builder)
            .with_structured(builder_schema());

        let response = self.ctx.gateway.chat(&messages, &options).await?;
        let output: BuilderOutput = parse_structured(&response.content)?;

        if output.results.artifact.trim().is_empty() {
            // Leave the todo in progress; the planner may cancel or
            // rewrite it next cycle.
            self.ctx
                .trace(
                    stack_id,
                    AgentType::Builder,
                    &output.thinking,
                    &format!("build: {}", todo.content),
                    "artifact_created=false",
                )
                .await?;
            return Ok(RunOutcome::ran(
                format!("build: {}", todo.content),
                "artifact_created=false".to_string(),
            ));
        }

        let stored = self
            .ctx
            .artifacts
            .append(&Artifact::html(stack_id, output.results.artifact.clone()))
            .await?;

        todo.status = TodoStatus::Completed;
        todo.completed_at = Some(Utc::now());
        self.ctx.todos.update(&todo).await?;

        if let Some(mut state) = self
            .ctx
            .agent_states
            .get(stack_id, AgentType::Builder)
            .await?
        {
            if let AgentMemory::Builder(memory) = &mut state.memory {
                memory.last_build_time = Some(Utc::now());
                memory.artifacts_built += 1;
            }
            state.push_thought(&output.thinking);
            self.ctx.agent_states.update(&state).await?;
        }

        let result = format!("artifact_created=true version={}", stored.version);
        self.ctx
            .trace(
                stack_id,
                AgentType::Builder,
                &output.thinking,
                &format!("build: {}", todo.content),
                &result,
            )
            .await?;

        Ok(RunOutcome::ran(format!("build: {}", todo.content), result))
    }
}
