//! Planner agent runner.
//!
//! Decides the project idea, maintains the todo backlog, and advances the
//! hackathon phase. Action application order is fixed: clear, project,
//! phase, then the remaining todo actions in input order.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::agents::runner::{parse_structured, AgentRunner, RunOutcome, RunnerContext};
use crate::agents::schemas::planner_schema;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentMemory, AgentType, ChatMessage, ProjectIdea, StackPhase, Todo, TodoStatus,
    TODO_PRIORITY_DEFAULT,
};
use crate::domain::ports::{
    AgentStateRepository, ProjectIdeaRepository, StackRepository, TodoRepository,
    UserMessageRepository,
};

/// Structured planner reply.
#[derive(Debug, Deserialize)]
pub struct PlannerOutput {
    pub thinking: String,
    #[serde(default)]
    pub actions: Vec<PlannerAction>,
}

/// One planner action.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlannerAction {
    CreateTodo {
        content: String,
        #[serde(default)]
        priority: Option<i64>,
    },
    UpdateTodo {
        content: String,
        #[serde(default)]
        new_content: Option<String>,
        #[serde(default)]
        priority: Option<i64>,
        #[serde(default)]
        status: Option<String>,
    },
    DeleteTodo {
        content: String,
    },
    ClearAllTodos,
    UpdateProject {
        title: String,
        #[serde(default)]
        description: String,
    },
    UpdatePhase {
        phase: String,
    },
}

impl PlannerAction {
    fn kind(&self) -> &'static str {
        match self {
            Self::CreateTodo { .. } => "create_todo",
            Self::UpdateTodo { .. } => "update_todo",
            Self::DeleteTodo { .. } => "delete_todo",
            Self::ClearAllTodos => "clear_all_todos",
            Self::UpdateProject { .. } => "update_project",
            Self::UpdatePhase { .. } => "update_phase",
        }
    }
}

pub struct PlannerRunner {
    ctx: Arc<RunnerContext>,
}

impl PlannerRunner {
    pub fn new(ctx: Arc<RunnerContext>) -> Self {
        Self { ctx }
    }

    async fn build_prompt(&self, stack_id: Uuid, reason: &str) -> DomainResult<Vec<ChatMessage>> {
        let stack = self
            .ctx
            .stacks
            .get(stack_id)
            .await?
            .ok_or(DomainError::StackNotFound(stack_id))?;
        let project = self.ctx.projects.get_for_stack(stack_id).await?;
        let todos = self.ctx.todos.list_for_stack(stack_id, None).await?;
        let state = self
            .ctx
            .agent_states
            .get(stack_id, AgentType::Planner)
            .await?;

        let mut prompt = format!(
            "Team: {}\nPhase: {}\nScheduled because: {}\n",
            stack.participant_name,
            stack.phase.as_str(),
            reason
        );

        match &project {
            Some(idea) => {
                prompt.push_str(&format!(
                    "\nProject: {}\n{}\n",
                    idea.title, idea.description
                ));
            }
            None => prompt.push_str("\nNo project idea yet. Decide one now.\n"),
        }

        if todos.is_empty() {
            prompt.push_str("\nTodo list is empty.\n");
        } else {
            prompt.push_str("\nTodos:\n");
            for todo in &todos {
                prompt.push_str(&format!(
                    "- [{}] (priority {}) {}\n",
                    todo.status.as_str(),
                    todo.priority,
                    todo.content
                ));
            }
        }

        if let Some(memory) = state.as_ref().and_then(|s| s.memory.as_planner()) {
            if !memory.reviewer_recommendations.is_empty() {
                prompt.push_str("\nReviewer recommendations to address:\n");
                for rec in &memory.reviewer_recommendations {
                    prompt.push_str(&format!("- {rec}\n"));
                }
            }
        }

        let user_messages = self.ctx.user_messages.list_unprocessed(stack_id).await?;
        if !user_messages.is_empty() {
            prompt.push_str("\nUnanswered visitor messages (for planning context only):\n");
            for msg in user_messages.iter().take(5) {
                prompt.push_str(&format!("- {}: {}\n", msg.sender_name, msg.content));
            }
        }

        Ok(vec![
            ChatMessage::system(
                "You are the planner of a four-agent hackathon team building a single \
                 HTML artifact. Keep the backlog small and concrete. Use clear_all_todos \
                 only for a full pivot. Advance the phase when the work justifies it.",
            ),
            ChatMessage::user(prompt),
        ])
    }

    /// Apply actions in the contract order. Returns a short summary of
    /// what was applied.
    async fn apply_actions(
        &self,
        stack_id: Uuid,
        actions: &[PlannerAction],
    ) -> DomainResult<String> {
        let mut applied: Vec<String> = Vec::new();

        // 1. clear_all_todos wins over everything else this cycle.
        if actions
            .iter()
            .any(|a| matches!(a, PlannerAction::ClearAllTodos))
        {
            let cleared = self.ctx.todos.clear_for_stack(stack_id).await?;
            applied.push(format!("cleared {cleared} todos"));
        }

        // 2. Project upsert.
        for action in actions {
            if let PlannerAction::UpdateProject { title, description } = action {
                if title.trim().is_empty() {
                    warn!(stack_id = %stack_id, "update_project with empty title skipped");
                    continue;
                }
                self.ctx
                    .projects
                    .upsert(&ProjectIdea::new(stack_id, title.clone(), description.clone()))
                    .await?;
                applied.push(format!("project set to '{title}'"));
            }
        }

        // 3. Phase change; unknown literals are skipped, not fatal.
        for action in actions {
            if let PlannerAction::UpdatePhase { phase } = action {
                match StackPhase::from_str(phase) {
                    Some(parsed) => {
                        self.ctx.stacks.set_phase(stack_id, parsed).await?;
                        applied.push(format!("phase -> {}", parsed.as_str()));
                    }
                    None => {
                        warn!(stack_id = %stack_id, phase = %phase, "unknown phase literal skipped");
                    }
                }
            }
        }

        // 4. Remaining todo actions in input order.
        for action in actions {
            match action {
                PlannerAction::CreateTodo { content, priority } => {
                    let priority = priority.unwrap_or(TODO_PRIORITY_DEFAULT);
                    self.ctx
                        .todos
                        .create(&Todo::new(stack_id, content.clone(), priority))
                        .await?;
                    applied.push(format!("created '{content}'"));
                }
                PlannerAction::UpdateTodo {
                    content,
                    new_content,
                    priority,
                    status,
                } => {
                    let Some(mut todo) = self.ctx.todos.find_by_content(stack_id, content).await?
                    else {
                        warn!(stack_id = %stack_id, content = %content, "update_todo had no exact match, skipped");
                        continue;
                    };
                    if let Some(new_content) = new_content {
                        todo.content = new_content.clone();
                    }
                    if let Some(priority) = priority {
                        todo.priority = (*priority).clamp(1, 10);
                    }
                    if let Some(status) = status {
                        match TodoStatus::from_str(status) {
                            Some(new_status) if todo.status.can_transition_to(new_status) => {
                                todo.status = new_status;
                                if new_status == TodoStatus::Completed {
                                    todo.completed_at = Some(Utc::now());
                                }
                            }
                            Some(new_status) if new_status == todo.status => {}
                            _ => {
                                warn!(stack_id = %stack_id, status = %status, "invalid todo status change skipped");
                            }
                        }
                    }
                    self.ctx.todos.update(&todo).await?;
                    applied.push(format!("updated '{content}'"));
                }
                PlannerAction::DeleteTodo { content } => {
                    let Some(todo) = self.ctx.todos.find_by_content(stack_id, content).await?
                    else {
                        warn!(stack_id = %stack_id, content = %content, "delete_todo had no exact match, skipped");
                        continue;
                    };
                    self.ctx.todos.delete(todo.id).await?;
                    applied.push(format!("deleted '{content}'"));
                }
                _ => {}
            }
        }

        Ok(if applied.is_empty() {
            "no actions applied".to_string()
        } else {
            applied.join("; ")
        })
    }
}

#[async_trait]
impl AgentRunner for PlannerRunner {
    fn agent_type(&self) -> AgentType {
        AgentType::Planner
    }

    async fn run(&self, stack_id: Uuid, reason: &str) -> DomainResult<RunOutcome> {
        let Some(loaded) = self
            .ctx
            .agent_states
            .get(stack_id, AgentType::Planner)
            .await?
        else {
            return Ok(RunOutcome::skipped("planner state missing"));
        };
        let consumed_recommendations = loaded
            .memory
            .as_planner()
            .map(|m| m.reviewer_recommendations.clone())
            .unwrap_or_default();

        let messages = self.build_prompt(stack_id, reason).await?;
        let options = self
            .ctx
            .chat_options_for(AgentType::Planner)
            .with_structured(planner_schema());

        let response = self.ctx.gateway.chat(&messages, &options).await?;
        let output: PlannerOutput = parse_structured(&response.content)?;

        let action_kinds = output
            .actions
            .iter()
            .map(PlannerAction::kind)
            .collect::<Vec<_>>()
            .join(", ");
        let summary = self.apply_actions(stack_id, &output.actions).await?;

        // Re-fetch before persisting: a reviewer running in the same wave
        // may have handed off new recommendations mid-flight. Only the
        // recommendations this run actually saw count as consumed.
        let mut state = self
            .ctx
            .agent_states
            .get(stack_id, AgentType::Planner)
            .await?
            .unwrap_or(loaded);
        if let AgentMemory::Planner(memory) = &mut state.memory {
            if memory.reviewer_recommendations == consumed_recommendations {
                memory.reviewer_recommendations.clear();
                memory.recommendations_timestamp = None;
                memory.recommendations_type = None;
            }
            memory.last_planning_time = Some(Utc::now());
        }
        state.push_thought(&output.thinking);
        self.ctx.agent_states.update(&state).await?;

        self.ctx
            .trace(
                stack_id,
                AgentType::Planner,
                &output.thinking,
                &format!("plan: [{action_kinds}]"),
                &summary,
            )
            .await?;

        Ok(RunOutcome::ran(format!("plan: [{action_kinds}]"), summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_deserialize_by_tag() {
        let json = r#"[
            {"type": "clear_all_todos"},
            {"type": "update_project", "title": "Pixel Garden", "description": "A plant sim"},
            {"type": "create_todo", "content": "build landing page", "priority": 8},
            {"type": "create_todo", "content": "untagged priority"},
            {"type": "update_phase", "phase": "building"}
        ]"#;
        let actions: Vec<PlannerAction> = serde_json::from_str(json).unwrap();
        assert_eq!(actions.len(), 5);
        assert!(matches!(actions[0], PlannerAction::ClearAllTodos));
        match &actions[3] {
            PlannerAction::CreateTodo { priority, .. } => assert!(priority.is_none()),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_output_tolerates_missing_actions() {
        let output: PlannerOutput =
            serde_json::from_str(r#"{"thinking": "nothing to do"}"#).unwrap();
        assert!(output.actions.is_empty());
    }
}
