//! HTTP API regression tests using in-process router calls.

mod helpers;

use helpers::TestHarness;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use stackhive::adapters::http::{build_router, AppState};
use stackhive::services::{StatsService, WorkDetector};

async fn router_for(harness: &TestHarness) -> axum::Router {
    let state = Arc::new(AppState {
        admin: harness.admin(),
        detector: Arc::new(WorkDetector::new(
            harness.ctx.clone(),
            harness.executions.clone(),
        )),
        stats: StatsService::new(harness.executions.clone()),
        executions: harness.executions.clone(),
        traces: harness.ctx.traces.clone(),
    });
    build_router(state, true)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_stack_crud_round_trip() {
    let harness = TestHarness::new().await;
    let router = router_for(&harness).await;

    // Create.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/stacks")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"participant_name": "Hex"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["id"].as_str().unwrap().to_string();

    // List includes it.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/stacks")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Start, then read back the state.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/stacks/{id}/start"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/stacks/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let stack = body_json(response).await;
    assert_eq!(stack["execution_state"], "running");

    // Delete.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/stacks/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_unknown_stack_is_404() {
    let harness = TestHarness::new().await;
    let router = router_for(&harness).await;

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/stacks/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_transition_is_400() {
    let harness = TestHarness::new().await;
    let stack = harness.admin().create_stack("Idle").await.unwrap();
    let router = router_for(&harness).await;

    // idle -> paused is not allowed.
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/stacks/{}/pause", stack.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_visitor_chat_and_history() {
    let harness = TestHarness::new().await;
    let stack = harness.admin().create_stack("Chatty").await.unwrap();
    let router = router_for(&harness).await;

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/stacks/{}/chat", stack.id))
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"sender_name": "Visitor", "content": "how is it going?"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/stacks/{}/chat?limit=10", stack.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let history = body_json(response).await;
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["sender_name"], "Visitor");
    assert!(entries[0]["reply"].is_null());
}

#[tokio::test]
async fn test_work_status_endpoint() {
    let harness = TestHarness::new().await;
    let stack = harness.admin().create_stack("Worky").await.unwrap();
    let router = router_for(&harness).await;

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/stacks/{}/work-status", stack.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let status = body_json(response).await;
    // A fresh stack has no project, so the planner is critical.
    assert_eq!(status["planner"]["priority"], 10);
}

#[tokio::test]
async fn test_stats_endpoint_empty_window() {
    let harness = TestHarness::new().await;
    let stack = harness.admin().create_stack("Stats").await.unwrap();
    let router = router_for(&harness).await;

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/stacks/{}/stats?window_ms=60000", stack.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;
    assert_eq!(stats["total_cycles"], 0);
}
