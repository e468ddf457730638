//! Admin, observability and visitor-chat HTTP server.
//!
//! Serves the operator dashboard and visitor chat. Everything here is a
//! thin layer over the services; no orchestration logic lives in handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{
    AgentTrace, ExecutionGraphRecord, OrchestrationStats, OrchestratorExecution, Stack,
    WorkStatus,
};
use crate::domain::ports::{ExecutionRepository, TraceRepository};
use crate::services::{AdminService, StatsService, WorkDetector};

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// Shared handler state.
pub struct AppState {
    pub admin: AdminService,
    pub detector: Arc<WorkDetector>,
    pub stats: StatsService,
    pub executions: Arc<dyn ExecutionRepository>,
    pub traces: Arc<dyn TraceRepository>,
}

#[derive(Debug, Deserialize)]
pub struct CreateStackRequest {
    pub participant_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SendChatRequest {
    pub sender_name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Trailing window in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

fn default_window_ms() -> u64 {
    60 * 60 * 1000
}

#[derive(Debug, Serialize)]
pub struct ChatEntry {
    pub sender_name: String,
    pub content: String,
    pub sent_at: String,
    pub reply: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn map_error(err: DomainError) -> ApiError {
    let status = match &err {
        DomainError::StackNotFound(_)
        | DomainError::TodoNotFound(_)
        | DomainError::MessageNotFound(_)
        | DomainError::ExecutionNotFound(_)
        | DomainError::AgentStateNotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::ValidationFailed(_) | DomainError::InvalidStateTransition { .. } => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

/// Build the router with all routes and middleware.
pub fn build_router(state: Arc<AppState>, enable_cors: bool) -> Router {
    let mut router = Router::new()
        .route("/api/v1/stacks", post(create_stack).get(list_stacks))
        .route("/api/v1/stacks/:id", get(get_stack).delete(delete_stack))
        .route("/api/v1/stacks/:id/start", post(start_execution))
        .route("/api/v1/stacks/:id/pause", post(pause_execution))
        .route("/api/v1/stacks/:id/resume", post(resume_execution))
        .route("/api/v1/stacks/:id/stop", post(stop_execution))
        .route("/api/v1/stacks/:id/execution", get(get_execution_status))
        .route("/api/v1/stacks/:id/executions", get(get_recent_executions))
        .route("/api/v1/stacks/:id/traces", get(get_recent_traces))
        .route("/api/v1/stacks/:id/graphs", get(get_execution_graphs))
        .route("/api/v1/stacks/:id/work-status", get(get_work_status))
        .route("/api/v1/stacks/:id/stats", get(get_stats))
        .route("/api/v1/stacks/:id/chat", post(send_chat).get(get_chat))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Bind and serve until the process exits.
pub async fn serve(state: Arc<AppState>, config: HttpConfig) -> anyhow::Result<()> {
    let router = build_router(state, config.enable_cors);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "http server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn create_stack(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateStackRequest>,
) -> Result<(StatusCode, Json<Stack>), ApiError> {
    let stack = state
        .admin
        .create_stack(&request.participant_name)
        .await
        .map_err(map_error)?;
    Ok((StatusCode::CREATED, Json(stack)))
}

async fn list_stacks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Stack>>, ApiError> {
    Ok(Json(state.admin.list_stacks().await.map_err(map_error)?))
}

async fn get_stack(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Stack>, ApiError> {
    Ok(Json(state.admin.get_stack(id).await.map_err(map_error)?))
}

async fn delete_stack(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.admin.delete_stack(id).await.map_err(map_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn start_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.admin.start_execution(id).await.map_err(map_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn pause_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.admin.pause_execution(id).await.map_err(map_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn resume_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.admin.resume_execution(id).await.map_err(map_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stop_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.admin.stop_execution(id).await.map_err(map_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_execution_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<OrchestratorExecution>>, ApiError> {
    // 404 on unknown stacks rather than an empty payload.
    state.admin.get_stack(id).await.map_err(map_error)?;
    Ok(Json(state.executions.latest(id).await.map_err(map_error)?))
}

async fn get_recent_executions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<OrchestratorExecution>>, ApiError> {
    Ok(Json(
        state
            .executions
            .recent(id, query.limit)
            .await
            .map_err(map_error)?,
    ))
}

async fn get_recent_traces(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<AgentTrace>>, ApiError> {
    Ok(Json(
        state
            .traces
            .recent(id, query.limit)
            .await
            .map_err(map_error)?,
    ))
}

async fn get_execution_graphs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<ExecutionGraphRecord>>, ApiError> {
    Ok(Json(
        state
            .executions
            .recent_graphs(id, query.limit)
            .await
            .map_err(map_error)?,
    ))
}

async fn get_work_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkStatus>, ApiError> {
    Ok(Json(state.detector.peek(id).await.map_err(map_error)?))
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<OrchestrationStats>, ApiError> {
    Ok(Json(
        state
            .stats
            .orchestration_stats(id, std::time::Duration::from_millis(query.window_ms))
            .await
            .map_err(map_error)?,
    ))
}

async fn send_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<SendChatRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let message = state
        .admin
        .send_user_message(id, &request.sender_name, &request.content)
        .await
        .map_err(map_error)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": message.id})),
    ))
}

async fn get_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<ChatEntry>>, ApiError> {
    let history = state
        .admin
        .chat_history(id, query.limit)
        .await
        .map_err(map_error)?;
    let entries = history
        .into_iter()
        .map(|(message, reply)| ChatEntry {
            sender_name: message.sender_name,
            content: message.content,
            sent_at: message.sent_at.to_rfc3339(),
            reply: reply.map(|r| r.content),
        })
        .collect();
    Ok(Json(entries))
}
