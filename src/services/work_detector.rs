//! Work detection.
//!
//! `evaluate` is a pure function over a `WorkContext` snapshot; running it
//! twice on the same snapshot yields the same result. The service wrapper
//! adds snapshot loading (parallel queries) and the short-TTL cache.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::agents::RunnerContext;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentType, AgentWork, Stack, TodoStatus, WorkContext, WorkDetectionCache, WorkStatus,
};
use crate::domain::ports::{
    AgentStateRepository, ArtifactRepository, ExecutionRepository, MessageRepository,
    ProjectIdeaRepository, StackRepository, TodoRepository, UserMessageRepository,
};

/// Planner is considered stale after this long without planning.
const PLANNER_STALE_AFTER_MINS: i64 = 5;
/// Reviewer is considered stale after this long without reviewing.
const REVIEWER_STALE_AFTER_MINS: i64 = 3;
/// Completed-todo count that triggers a review.
const REVIEW_COMPLETION_THRESHOLD: u64 = 2;
/// A visitor message containing any of these is strategic input for the
/// planner; so is any message longer than `STRATEGIC_LENGTH`.
const STRATEGIC_KEYWORDS: [&str; 6] = [
    "feature",
    "add",
    "change project",
    "different",
    "instead",
    "modify",
];
const STRATEGIC_LENGTH: usize = 100;

/// Pure rule evaluation over a snapshot.
pub fn evaluate(ctx: &WorkContext) -> WorkStatus {
    let builder = builder_work(ctx);
    let mut reviewer = reviewer_work(ctx);
    if builder.has_work {
        // Reviewer should see the artifact the builder is about to
        // produce, so it trails the builder by one wave.
        reviewer = reviewer.with_dependency(AgentType::Builder);
    }

    WorkStatus {
        planner: planner_work(ctx),
        builder,
        communicator: communicator_work(ctx),
        reviewer,
    }
}

fn planner_work(ctx: &WorkContext) -> AgentWork {
    if ctx.project_idea.is_none() {
        return AgentWork::some(10, "no project idea");
    }

    if ctx.pending_todos().next().is_none() {
        return AgentWork::some(9, "no pending todos");
    }

    let memory = ctx
        .agent_state(AgentType::Planner)
        .and_then(|s| s.memory.as_planner());

    if memory.is_some_and(|m| !m.reviewer_recommendations.is_empty()) {
        return AgentWork::some(8, "reviewer recommendations pending");
    }

    if ctx
        .unprocessed_user_messages
        .iter()
        .any(|m| is_strategic(&m.content))
    {
        return AgentWork::some(7, "strategic visitor input");
    }

    let stale = match memory.and_then(|m| m.last_planning_time) {
        Some(last) => ctx.now - last > ChronoDuration::minutes(PLANNER_STALE_AFTER_MINS),
        None => true,
    };
    if stale {
        return AgentWork::some(4, "planning is stale");
    }

    AgentWork::none()
}

fn builder_work(ctx: &WorkContext) -> AgentWork {
    let pending: Vec<_> = ctx.pending_todos().filter(|t| t.priority > 0).collect();
    if pending.is_empty() {
        return AgentWork::none();
    }

    let count = pending.len();
    if pending.iter().any(|t| t.priority >= 3) {
        AgentWork::some(8, format!("{count} pending todo(s), high priority"))
    } else {
        AgentWork::some(6, format!("{count} pending todo(s)"))
    }
}

fn communicator_work(ctx: &WorkContext) -> AgentWork {
    if !ctx.unprocessed_user_messages.is_empty() {
        return AgentWork::some(
            10,
            format!(
                "{} visitor message(s) waiting",
                ctx.unprocessed_user_messages.len()
            ),
        );
    }

    // The snapshot's unread set is already filtered to messages addressed
    // to or broadcast at this stack, unread by it, and not sent by it.
    if !ctx.unread_messages.is_empty() {
        return AgentWork::some(
            7,
            format!("{} unread peer message(s)", ctx.unread_messages.len()),
        );
    }

    AgentWork::none()
}

fn reviewer_work(ctx: &WorkContext) -> AgentWork {
    let memory = ctx
        .agent_state(AgentType::Reviewer)
        .and_then(|s| s.memory.as_reviewer());
    let last_review = memory.and_then(|m| m.last_review_time);

    let completed_since = ctx
        .todos
        .iter()
        .filter(|t| t.status == TodoStatus::Completed)
        .filter(|t| match (t.completed_at, last_review) {
            (Some(done), Some(review)) => done > review,
            (Some(_), None) => true,
            (None, _) => false,
        })
        .count() as u64;
    if completed_since >= REVIEW_COMPLETION_THRESHOLD {
        return AgentWork::some(6, format!("{completed_since} todos completed since last review"));
    }

    if let Some(artifact) = &ctx.latest_artifact {
        let is_new = last_review.is_none_or(|review| artifact.created_at > review);
        if is_new {
            return AgentWork::some(6, format!("artifact v{} not yet reviewed", artifact.version));
        }
    }

    // Staleness only matters once the reviewer has a review history;
    // before that there is nothing to re-check.
    if let Some(review) = last_review {
        if ctx.now - review > ChronoDuration::minutes(REVIEWER_STALE_AFTER_MINS) {
            return AgentWork::some(4, "review is stale");
        }
    }

    AgentWork::none()
}

fn is_strategic(content: &str) -> bool {
    if content.chars().count() > STRATEGIC_LENGTH {
        return true;
    }
    let lowered = content.to_lowercase();
    STRATEGIC_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// Snapshot loading and TTL caching around the pure rules.
pub struct WorkDetector {
    ctx: Arc<RunnerContext>,
    executions: Arc<dyn ExecutionRepository>,
}

impl WorkDetector {
    pub fn new(ctx: Arc<RunnerContext>, executions: Arc<dyn ExecutionRepository>) -> Self {
        Self { ctx, executions }
    }

    /// Fetch the full snapshot for a stack in parallel.
    pub async fn snapshot(&self, stack: Stack) -> DomainResult<WorkContext> {
        let stack_id = stack.id;
        let (todos, unread, latest, project, states, visitors) = tokio::join!(
            self.ctx.todos.list_for_stack(stack_id, None),
            self.ctx.messages.unread_for_stack(stack_id),
            self.ctx.artifacts.latest(stack_id),
            self.ctx.projects.get_for_stack(stack_id),
            self.ctx.agent_states.list_for_stack(stack_id),
            self.ctx.user_messages.list_unprocessed(stack_id),
        );

        Ok(WorkContext {
            stack,
            todos: todos?,
            unread_messages: unread?,
            latest_artifact: latest?,
            project_idea: project?,
            agent_states: states?,
            unprocessed_user_messages: visitors?,
            now: Utc::now(),
        })
    }

    /// Cache-aware detection: reuse a fresh cached status, otherwise
    /// snapshot, evaluate, and replace the cache row.
    pub async fn detect(&self, stack_id: Uuid) -> DomainResult<WorkStatus> {
        let now = Utc::now();
        if let Some(cache) = self.executions.get_work_cache(stack_id).await? {
            if cache.is_fresh(now) {
                debug!(stack_id = %stack_id, "work detection cache hit");
                return Ok(cache.status);
            }
        }

        let stack = self
            .ctx
            .stacks
            .get(stack_id)
            .await?
            .ok_or(DomainError::StackNotFound(stack_id))?;
        let snapshot = self.snapshot(stack).await?;
        let status = evaluate(&snapshot);

        self.executions
            .put_work_cache(&WorkDetectionCache::new(stack_id, status.clone(), snapshot.now))
            .await?;

        Ok(status)
    }

    /// Read-only view for the observability RPC: fresh cache if present,
    /// else a recomputation that leaves the cache untouched.
    pub async fn peek(&self, stack_id: Uuid) -> DomainResult<WorkStatus> {
        let now = Utc::now();
        if let Some(cache) = self.executions.get_work_cache(stack_id).await? {
            if cache.is_fresh(now) {
                return Ok(cache.status);
            }
        }

        let stack = self
            .ctx
            .stacks
            .get(stack_id)
            .await?
            .ok_or(DomainError::StackNotFound(stack_id))?;
        let snapshot = self.snapshot(stack).await?;
        Ok(evaluate(&snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        AgentMemory, AgentState, Artifact, PlannerMemory, ProjectIdea, ReviewerMemory, Todo,
        UserMessage,
    };
    use proptest::prelude::*;

    fn base_context() -> WorkContext {
        let stack = Stack::new("test");
        let stack_id = stack.id;
        WorkContext {
            stack,
            todos: vec![],
            unread_messages: vec![],
            latest_artifact: None,
            project_idea: None,
            agent_states: AgentType::ALL
                .into_iter()
                .map(|a| AgentState::new(stack_id, a))
                .collect(),
            unprocessed_user_messages: vec![],
            now: Utc::now(),
        }
    }

    fn with_project(mut ctx: WorkContext) -> WorkContext {
        ctx.project_idea = Some(ProjectIdea::new(ctx.stack.id, "X", "desc"));
        ctx
    }

    fn with_planner_memory(mut ctx: WorkContext, memory: PlannerMemory) -> WorkContext {
        for state in &mut ctx.agent_states {
            if state.agent_type == AgentType::Planner {
                state.memory = AgentMemory::Planner(memory.clone());
            }
        }
        ctx
    }

    fn with_reviewer_memory(mut ctx: WorkContext, memory: ReviewerMemory) -> WorkContext {
        for state in &mut ctx.agent_states {
            if state.agent_type == AgentType::Reviewer {
                state.memory = AgentMemory::Reviewer(memory.clone());
            }
        }
        ctx
    }

    fn recently_planned() -> PlannerMemory {
        PlannerMemory {
            last_planning_time: Some(Utc::now()),
            ..Default::default()
        }
    }

    #[test]
    fn test_planner_priority_10_without_project() {
        let status = evaluate(&base_context());
        assert_eq!(status.planner.priority, 10);
        assert!(status.planner.has_work);
    }

    #[test]
    fn test_planner_priority_9_without_pending_todos() {
        let ctx = with_project(base_context());
        let status = evaluate(&ctx);
        assert_eq!(status.planner.priority, 9);
    }

    #[test]
    fn test_planner_priority_8_with_recommendations() {
        let mut ctx = with_project(base_context());
        ctx.todos.push(Todo::new(ctx.stack.id, "task", 5));
        let ctx = with_planner_memory(
            ctx,
            PlannerMemory {
                last_planning_time: Some(Utc::now()),
                reviewer_recommendations: vec!["fix nav".to_string()],
                ..Default::default()
            },
        );
        let status = evaluate(&ctx);
        assert_eq!(status.planner.priority, 8);
    }

    #[test]
    fn test_planner_priority_7_on_strategic_message() {
        let mut ctx = with_project(base_context());
        ctx.todos.push(Todo::new(ctx.stack.id, "task", 5));
        ctx.unprocessed_user_messages.push(UserMessage::new(
            ctx.stack.id,
            "Alice",
            "can you add dark mode?",
        ));
        let ctx = with_planner_memory(ctx, recently_planned());
        let status = evaluate(&ctx);
        assert_eq!(status.planner.priority, 7);
    }

    #[test]
    fn test_long_message_is_strategic() {
        assert!(is_strategic(&"x".repeat(101)));
        assert!(is_strategic("please make it DIFFERENT"));
        assert!(!is_strategic("nice work!"));
    }

    #[test]
    fn test_planner_priority_4_when_stale() {
        let mut ctx = with_project(base_context());
        ctx.todos.push(Todo::new(ctx.stack.id, "task", 5));
        let ctx = with_planner_memory(
            ctx,
            PlannerMemory {
                last_planning_time: Some(Utc::now() - ChronoDuration::minutes(6)),
                ..Default::default()
            },
        );
        let status = evaluate(&ctx);
        assert_eq!(status.planner.priority, 4);
    }

    #[test]
    fn test_planner_idle_when_fresh() {
        let mut ctx = with_project(base_context());
        ctx.todos.push(Todo::new(ctx.stack.id, "task", 5));
        let ctx = with_planner_memory(ctx, recently_planned());
        let status = evaluate(&ctx);
        assert_eq!(status.planner.priority, 0);
        assert!(!status.planner.has_work);
    }

    #[test]
    fn test_builder_absent_without_pending_todos() {
        let ctx = with_project(base_context());
        let status = evaluate(&ctx);
        assert!(!status.builder.has_work);
    }

    #[test]
    fn test_builder_priority_by_todo_priority() {
        let mut ctx = with_project(base_context());
        ctx.todos.push(Todo::new(ctx.stack.id, "minor", 2));
        assert_eq!(evaluate(&ctx).builder.priority, 6);

        ctx.todos.push(Todo::new(ctx.stack.id, "major", 5));
        assert_eq!(evaluate(&ctx).builder.priority, 8);
    }

    #[test]
    fn test_communicator_visitor_beats_peers() {
        let mut ctx = base_context();
        ctx.unprocessed_user_messages
            .push(UserMessage::new(ctx.stack.id, "Ann", "hello"));
        ctx.unread_messages.push(
            crate::domain::models::Message::broadcast(Uuid::new_v4(), "hi all"),
        );
        let status = evaluate(&ctx);
        assert_eq!(status.communicator.priority, 10);
    }

    #[test]
    fn test_communicator_priority_7_on_unread_peers() {
        let mut ctx = base_context();
        ctx.unread_messages.push(
            crate::domain::models::Message::broadcast(Uuid::new_v4(), "hi all"),
        );
        let status = evaluate(&ctx);
        assert_eq!(status.communicator.priority, 7);
    }

    #[test]
    fn test_reviewer_on_new_artifact_with_builder_dependency() {
        let mut ctx = with_project(base_context());
        ctx.todos.push(Todo::new(ctx.stack.id, "task", 5));
        let mut artifact = Artifact::html(ctx.stack.id, "<html></html>");
        artifact.version = 3;
        ctx.latest_artifact = Some(artifact);

        let status = evaluate(&ctx);
        assert_eq!(status.reviewer.priority, 6);
        // Builder has work too, so the reviewer trails it.
        assert_eq!(status.reviewer.dependencies, vec![AgentType::Builder]);
    }

    #[test]
    fn test_reviewer_no_dependency_when_builder_idle() {
        let mut ctx = with_project(base_context());
        let mut artifact = Artifact::html(ctx.stack.id, "<html></html>");
        artifact.version = 1;
        ctx.latest_artifact = Some(artifact);

        let status = evaluate(&ctx);
        assert!(status.reviewer.has_work);
        assert!(status.reviewer.dependencies.is_empty());
    }

    #[test]
    fn test_reviewer_skips_reviewed_artifact() {
        let mut ctx = with_project(base_context());
        let mut artifact = Artifact::html(ctx.stack.id, "<html></html>");
        artifact.version = 2;
        artifact.created_at = Utc::now() - ChronoDuration::minutes(2);
        ctx.latest_artifact = Some(artifact);
        let ctx = with_reviewer_memory(
            ctx,
            ReviewerMemory {
                last_review_time: Some(Utc::now() - ChronoDuration::minutes(1)),
                last_reviewed_version: Some(2),
                ..Default::default()
            },
        );

        let status = evaluate(&ctx);
        assert!(!status.reviewer.has_work);
    }

    #[test]
    fn test_reviewer_on_completed_todos() {
        let mut ctx = with_project(base_context());
        for i in 0..2 {
            let mut todo = Todo::new(ctx.stack.id, format!("done {i}"), 5);
            todo.status = TodoStatus::Completed;
            todo.completed_at = Some(Utc::now());
            ctx.todos.push(todo);
        }
        let status = evaluate(&ctx);
        assert_eq!(status.reviewer.priority, 6);
    }

    #[test]
    fn test_reviewer_stale_after_three_minutes() {
        let mut ctx = with_project(base_context());
        ctx.todos.push(Todo::new(ctx.stack.id, "task", 5));
        let mut artifact = Artifact::html(ctx.stack.id, "<html></html>");
        artifact.created_at = Utc::now() - ChronoDuration::minutes(10);
        ctx.latest_artifact = Some(artifact);
        let ctx = with_reviewer_memory(
            ctx,
            ReviewerMemory {
                last_review_time: Some(Utc::now() - ChronoDuration::minutes(4)),
                last_reviewed_version: Some(1),
                ..Default::default()
            },
        );

        let status = evaluate(&ctx);
        assert_eq!(status.reviewer.priority, 4);
    }

    proptest! {
        /// Detection is a pure function: same snapshot, same result.
        #[test]
        fn prop_evaluate_is_deterministic(
            todo_count in 0usize..5,
            priority in 1i64..=10,
            has_project in proptest::bool::ANY,
            visitor_count in 0usize..3,
        ) {
            let mut ctx = base_context();
            if has_project {
                ctx = with_project(ctx);
            }
            for i in 0..todo_count {
                ctx.todos.push(Todo::new(ctx.stack.id, format!("t{i}"), priority));
            }
            for i in 0..visitor_count {
                ctx.unprocessed_user_messages.push(
                    UserMessage::new(ctx.stack.id, format!("v{i}"), "add a thing"),
                );
            }

            let first = evaluate(&ctx);
            let second = evaluate(&ctx);
            prop_assert_eq!(first, second);
        }
    }
}
