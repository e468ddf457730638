//! Agent runner behavior tests: action ordering, precondition guards,
//! and failure surfacing.

mod helpers;

use helpers::{replies, TestHarness};

use stackhive::agents::{
    AgentRunner, BuilderRunner, CommunicatorRunner, PlannerRunner, ReviewerRunner, RunOutcome,
};
use stackhive::domain::models::{
    CycleDecision, CycleStatus, Message, StackPhase, TodoStatus,
};
use stackhive::domain::ports::{
    ArtifactRepository, MessageRepository, StackRepository, TodoRepository,
};

#[tokio::test]
async fn test_planner_clear_then_create_leaves_only_new_todos() {
    let harness = TestHarness::new().await;
    let stack = harness.running_stack("P1").await;
    harness.seed_project(stack.id, "X").await;
    harness.seed_todo(stack.id, "old one", 5).await;
    harness.seed_todo(stack.id, "old two", 5).await;

    harness.mock.push_for_schema(
        "planner_actions",
        serde_json::json!({
            "thinking": "pivot",
            "actions": [
                {"type": "create_todo", "content": "fresh start", "priority": 7},
                {"type": "clear_all_todos"}
            ]
        })
        .to_string(),
    );

    let planner = PlannerRunner::new(harness.ctx.clone());
    let outcome = planner.run(stack.id, "test").await.unwrap();
    assert!(matches!(outcome, RunOutcome::Ran { .. }));

    // clear_all_todos applies first regardless of its position, so only
    // the newly created todo survives.
    let todos = harness.ctx.todos.list_for_stack(stack.id, None).await.unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].content, "fresh start");
    assert_eq!(todos[0].priority, 7);
}

#[tokio::test]
async fn test_planner_update_and_phase_actions() {
    let harness = TestHarness::new().await;
    let stack = harness.running_stack("P2").await;
    harness.seed_project(stack.id, "X").await;
    harness.seed_todo(stack.id, "tune colors", 3).await;

    harness.mock.push_for_schema(
        "planner_actions",
        serde_json::json!({
            "thinking": "iterate",
            "actions": [
                {"type": "update_phase", "phase": "building"},
                {"type": "update_phase", "phase": "afterparty"},
                {"type": "update_todo", "content": "tune colors", "priority": 9},
                {"type": "update_todo", "content": "does not exist", "priority": 1},
                {"type": "delete_todo", "content": "also missing"}
            ]
        })
        .to_string(),
    );

    let planner = PlannerRunner::new(harness.ctx.clone());
    planner.run(stack.id, "test").await.unwrap();

    // Valid phase applied; the unknown literal was skipped.
    let loaded = harness.ctx.stacks.get(stack.id).await.unwrap().unwrap();
    assert_eq!(loaded.phase, StackPhase::Building);

    // Exact-content match updated the priority; misses were skipped.
    let todos = harness.ctx.todos.list_for_stack(stack.id, None).await.unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].priority, 9);
}

#[tokio::test]
async fn test_planner_llm_priority_wins_default_five() {
    let harness = TestHarness::new().await;
    let stack = harness.running_stack("P3").await;

    harness.mock.push_for_schema(
        "planner_actions",
        serde_json::json!({
            "thinking": "seed",
            "actions": [
                {"type": "create_todo", "content": "with priority", "priority": 9},
                {"type": "create_todo", "content": "without priority"}
            ]
        })
        .to_string(),
    );

    let planner = PlannerRunner::new(harness.ctx.clone());
    planner.run(stack.id, "test").await.unwrap();

    let todos = harness.ctx.todos.list_for_stack(stack.id, None).await.unwrap();
    let with = todos.iter().find(|t| t.content == "with priority").unwrap();
    let without = todos.iter().find(|t| t.content == "without priority").unwrap();
    assert_eq!(with.priority, 9);
    assert_eq!(without.priority, 5);
}

#[tokio::test]
async fn test_builder_empty_artifact_leaves_todo_in_progress() {
    let harness = TestHarness::new().await;
    let stack = harness.running_stack("B1").await;
    harness.seed_project(stack.id, "X").await;
    harness.seed_todo(stack.id, "impossible task", 5).await;

    harness
        .mock
        .push_for_schema("builder_artifact", replies::builder_artifact(""));

    let builder = BuilderRunner::new(harness.ctx.clone());
    let outcome = builder.run(stack.id, "test").await.unwrap();
    match outcome {
        RunOutcome::Ran { result, .. } => assert!(result.contains("artifact_created=false")),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let todos = harness.ctx.todos.list_for_stack(stack.id, None).await.unwrap();
    assert_eq!(todos[0].status, TodoStatus::InProgress);
    assert!(harness.ctx.artifacts.latest(stack.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_builder_skips_without_pending_todos() {
    let harness = TestHarness::new().await;
    let stack = harness.running_stack("B2").await;

    let builder = BuilderRunner::new(harness.ctx.clone());
    let outcome = builder.run(stack.id, "test").await.unwrap();
    assert!(matches!(outcome, RunOutcome::Skipped { .. }));
    assert_eq!(harness.mock.calls().len(), 0);
}

#[tokio::test]
async fn test_communicator_marks_all_peer_messages_read() {
    let harness = TestHarness::new().await;
    let stack = harness.running_stack("C1").await;
    let peer = harness.running_stack("C2").await;

    let first = Message::direct(peer.id, stack.id, "trade you some CSS");
    let second = Message::broadcast(peer.id, "anyone awake?");
    harness.ctx.messages.create(&first).await.unwrap();
    harness.ctx.messages.create(&second).await.unwrap();

    harness.mock.push_for_schema(
        "communicator_reply",
        replies::communicator_direct("deal!", "C2"),
    );

    let communicator = CommunicatorRunner::new(harness.ctx.clone());
    let outcome = communicator.run(stack.id, "test").await.unwrap();
    assert!(matches!(outcome, RunOutcome::Ran { .. }));

    // Both consumed; a rerun has nothing to do.
    let unread = harness.ctx.messages.unread_for_stack(stack.id).await.unwrap();
    assert!(unread.is_empty());
    let outcome = communicator.run(stack.id, "test").await.unwrap();
    assert!(matches!(outcome, RunOutcome::Skipped { .. }));

    // The reply went to the peer.
    let peer_unread = harness.ctx.messages.unread_for_stack(peer.id).await.unwrap();
    assert_eq!(peer_unread.len(), 1);
    assert_eq!(peer_unread[0].content, "deal!");
}

#[tokio::test]
async fn test_reviewer_same_version_reviewed_once() {
    let harness = TestHarness::new().await;
    let stack = harness.running_stack("R1").await;
    harness.seed_project(stack.id, "X").await;
    harness.seed_artifact(stack.id, "<html>v1</html>").await;

    harness.mock.push_for_schema(
        "reviewer_audit",
        replies::reviewer_audit(&["tighten spacing"]),
    );

    let reviewer = ReviewerRunner::new(harness.ctx.clone());
    let first = reviewer.run(stack.id, "test").await.unwrap();
    assert!(matches!(first, RunOutcome::Ran { .. }));

    let second = reviewer.run(stack.id, "test").await.unwrap();
    match second {
        RunOutcome::Skipped { reason } => assert!(reason.contains("already reviewed")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(harness.mock.calls_for_schema("reviewer_audit"), 1);
}

#[tokio::test]
async fn test_reviewer_drops_unknown_severity() {
    let harness = TestHarness::new().await;
    let stack = harness.running_stack("R2").await;
    harness.seed_artifact(stack.id, "<html>v1</html>").await;

    harness.mock.push_for_schema(
        "reviewer_audit",
        serde_json::json!({
            "thinking": "odd output",
            "results": {
                "recommendations": ["ship it"],
                "issues": [
                    {"severity": "catastrophic", "description": "dramatic but invalid"},
                    {"severity": "minor", "description": "small nit"}
                ]
            }
        })
        .to_string(),
    );

    let reviewer = ReviewerRunner::new(harness.ctx.clone());
    let outcome = reviewer.run(stack.id, "test").await.unwrap();
    match outcome {
        RunOutcome::Ran { result, .. } => assert!(result.contains("1 issue(s)")),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_structured_output_fails_cycle() {
    let harness = TestHarness::new().await;
    let stack = harness.running_stack("X1").await;
    // Planner is critical (no project) and the mock returns garbage.
    harness
        .mock
        .push_for_schema("planner_actions", "this is not json");

    let (execution, decision) = harness.run_single_cycle(stack.id).await;
    assert_eq!(execution.status, CycleStatus::Failed);
    assert!(execution.error.unwrap().contains("schema"));
    match decision {
        CycleDecision::Pause {
            duration_ms,
            reason,
        } => {
            assert_eq!(duration_ms, 5000);
            assert_eq!(reason, "agent failures");
        }
        other => panic!("unexpected decision: {other:?}"),
    }
}

#[tokio::test]
async fn test_llm_unavailable_fails_cycle() {
    let harness = TestHarness::new().await;
    let stack = harness.running_stack("X2").await;

    // Swap in a gateway whose only provider always fails.
    // The harness gateway is fixed, so drive the planner directly through
    // a context wired to a failing provider.
    use stackhive::adapters::llm::{LlmGateway, MockChatProvider};
    use stackhive::agents::RunnerContext;
    use std::sync::Arc;

    let failing = Arc::new(MockChatProvider::named("mock").always_fail("503 overloaded"));
    let ctx = Arc::new(RunnerContext {
        stacks: harness.ctx.stacks.clone(),
        agent_states: harness.ctx.agent_states.clone(),
        todos: harness.ctx.todos.clone(),
        projects: harness.ctx.projects.clone(),
        messages: harness.ctx.messages.clone(),
        user_messages: harness.ctx.user_messages.clone(),
        artifacts: harness.ctx.artifacts.clone(),
        traces: harness.ctx.traces.clone(),
        gateway: Arc::new(LlmGateway::new(vec![failing], vec!["mock".to_string()])),
        llm_timeout: std::time::Duration::from_secs(5),
        builder_llm_timeout: std::time::Duration::from_secs(5),
    });

    let planner = PlannerRunner::new(ctx);
    let err = planner.run(stack.id, "test").await.unwrap_err();
    assert!(matches!(
        err,
        stackhive::domain::errors::DomainError::LlmUnavailable { .. }
    ));
}
