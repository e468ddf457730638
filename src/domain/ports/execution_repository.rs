//! Orchestrator execution repository port.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ExecutionGraphRecord, OrchestratorExecution, WorkDetectionCache};

/// Repository interface for orchestrator executions, graph snapshots and
/// the work detection cache.
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// Most recent execution for a stack, by `started_at`.
    async fn latest(&self, stack_id: Uuid) -> DomainResult<Option<OrchestratorExecution>>;

    /// Acquire the single-flight lease: atomically insert a new `running`
    /// execution iff the latest one is absent, terminal, or older than
    /// `stale_after`. Returns the new row on success, `None` when another
    /// cycle holds the lease.
    async fn try_begin(
        &self,
        stack_id: Uuid,
        stale_after: Duration,
    ) -> DomainResult<Option<OrchestratorExecution>>;

    /// Persist a cycle's terminal state. Only touches the given row, so a
    /// reaped cycle finishing late cannot clobber its successor.
    async fn finalize(&self, execution: &OrchestratorExecution) -> DomainResult<()>;

    /// Get an execution by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<OrchestratorExecution>>;

    /// Recent executions for a stack, newest first.
    async fn recent(&self, stack_id: Uuid, limit: usize) -> DomainResult<Vec<OrchestratorExecution>>;

    /// Executions started within the trailing window, for stats.
    async fn within_window(
        &self,
        stack_id: Uuid,
        window: Duration,
    ) -> DomainResult<Vec<OrchestratorExecution>>;

    /// Persist a per-cycle graph snapshot.
    async fn record_graph(&self, record: &ExecutionGraphRecord) -> DomainResult<()>;

    /// Recent graph snapshots for a stack, newest first.
    async fn recent_graphs(
        &self,
        stack_id: Uuid,
        limit: usize,
    ) -> DomainResult<Vec<ExecutionGraphRecord>>;

    /// Read the stack's cached work status, fresh or stale.
    async fn get_work_cache(&self, stack_id: Uuid) -> DomainResult<Option<WorkDetectionCache>>;

    /// Replace the stack's cached work status atomically.
    async fn put_work_cache(&self, cache: &WorkDetectionCache) -> DomainResult<()>;
}
