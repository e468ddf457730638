//! Orchestrator core: the per-stack control loop.
//!
//! One cycle: verify the stack is runnable, detect work (cache-aware),
//! build the graph, execute it, decide pause/continue/stop, persist the
//! execution record. On `continue` the chain re-acquires the lease and
//! runs again immediately.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::agents::RunnerContext;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentType, CycleDecision, CycleStatus, ExecutionAnalysis, ExecutionGraphRecord, GraphSummary,
    NodeOutcome, OrchestratorExecution, WorkStatus,
};
use crate::domain::ports::{ExecutionRepository, StackRepository};
use crate::services::graph_builder;
use crate::services::graph_executor::GraphExecutor;
use crate::services::work_detector::WorkDetector;

/// Configuration for the orchestrator core.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// A `running` execution older than this is considered stuck.
    pub stale_after: Duration,
    /// Cap on back-to-back `continue` cycles inside one chain; the
    /// scheduler picks the stack up again on its next tick.
    pub max_continues: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(60),
            max_continues: 10,
        }
    }
}

/// Adaptive back-pressure: the more urgent the pending work, the shorter
/// the pause.
pub fn adaptive_pause(status: &WorkStatus) -> Duration {
    let max_priority = status.max_priority();
    if max_priority >= 5 {
        Duration::from_secs(1)
    } else if max_priority >= 3 {
        Duration::from_secs(5)
    } else {
        Duration::from_secs(10)
    }
}

pub struct Orchestrator {
    ctx: Arc<RunnerContext>,
    detector: WorkDetector,
    executor: GraphExecutor,
    executions: Arc<dyn ExecutionRepository>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        ctx: Arc<RunnerContext>,
        detector: WorkDetector,
        executor: GraphExecutor,
        executions: Arc<dyn ExecutionRepository>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            ctx,
            detector,
            executor,
            executions,
            config,
        }
    }

    pub fn detector(&self) -> &WorkDetector {
        &self.detector
    }

    /// Run cycles for one acquired lease, following `continue` decisions
    /// until a pause/stop or the chain bound.
    pub async fn run_chain(&self, mut execution: OrchestratorExecution) -> DomainResult<CycleDecision> {
        let stack_id = execution.stack_id;
        let mut continues = 0u32;

        loop {
            let decision = self.run_cycle(&mut execution).await?;

            if !matches!(decision, CycleDecision::Continue) {
                return Ok(decision);
            }
            if continues >= self.config.max_continues {
                info!(stack_id = %stack_id, "continue chain bound reached, yielding to scheduler");
                return Ok(decision);
            }
            continues += 1;

            // A continue means new work is likely; take a fresh lease and
            // go again without waiting for the scheduler.
            match self
                .executions
                .try_begin(stack_id, self.config.stale_after)
                .await?
            {
                Some(next) => execution = next,
                None => return Ok(decision),
            }
        }
    }

    /// Run one cycle against an already-acquired `running` execution row.
    #[instrument(skip(self, execution), fields(stack_id = %execution.stack_id, execution_id = %execution.id))]
    pub async fn run_cycle(
        &self,
        execution: &mut OrchestratorExecution,
    ) -> DomainResult<CycleDecision> {
        let stack_id = execution.stack_id;

        // 1. The stack must still exist and still be running.
        let stack = match self.ctx.stacks.get(stack_id).await {
            Ok(Some(stack)) => stack,
            Ok(None) => {
                // Deleted mid-flight; the execution row is gone with it.
                return Ok(CycleDecision::stop("stack deleted"));
            }
            Err(err) => return Err(err),
        };
        if stack.execution_state != crate::domain::models::ExecutionState::Running {
            let decision = CycleDecision::stop(format!(
                "stack is {}",
                stack.execution_state.as_str()
            ));
            self.finalize(execution, CycleStatus::Completed, Some(decision.clone()), None, None)
                .await?;
            return Ok(decision);
        }

        // 2-3. Detect work and build the graph.
        let status = self.detector.detect(stack_id).await?;
        let graph = graph_builder::build(&status);

        if graph.is_empty() {
            let pause = adaptive_pause(&status);
            let decision = CycleDecision::pause(pause, "no agents have work");
            self.finalize(execution, CycleStatus::Paused, Some(decision.clone()), None, None)
                .await?;
            self.ctx.stacks.increment_cycles(stack_id).await?;
            return Ok(decision);
        }

        // 4. Execute and snapshot the graph for observability.
        let analysis = self.executor.execute(stack_id, &graph).await?;
        self.record_graph_snapshot(stack_id, execution.id, &graph, &analysis)
            .await;

        // 5. Decide.
        let (status_out, decision) = decide(&analysis);
        let summary = GraphSummary {
            node_count: graph.nodes.len(),
            wave_count: graph.waves.len(),
            agents_run: analysis
                .agents_run
                .iter()
                .map(|a| a.as_str().to_string())
                .collect(),
            success_count: analysis.success_count,
            failure_count: analysis.failure_count,
            skipped_count: analysis.skipped_count,
            parallel_executions: analysis.parallel_executions,
        };
        let error = collect_errors(&analysis);

        // 6. Persist.
        self.finalize(execution, status_out, Some(decision.clone()), Some(summary), error)
            .await?;
        self.ctx.stacks.increment_cycles(stack_id).await?;

        Ok(decision)
    }

    async fn finalize(
        &self,
        execution: &mut OrchestratorExecution,
        status: CycleStatus,
        decision: Option<CycleDecision>,
        graph_summary: Option<GraphSummary>,
        error: Option<String>,
    ) -> DomainResult<()> {
        execution.status = status;
        execution.completed_at = Some(Utc::now());
        execution.pause_duration_ms = match &decision {
            Some(CycleDecision::Pause { duration_ms, .. }) => Some(*duration_ms),
            _ => None,
        };
        execution.decision = decision;
        execution.graph_summary = graph_summary;
        execution.error = error;
        self.executions.finalize(execution).await
    }

    async fn record_graph_snapshot(
        &self,
        stack_id: Uuid,
        execution_id: Uuid,
        graph: &crate::domain::models::AgentGraph,
        analysis: &ExecutionAnalysis,
    ) {
        let snapshot = serde_json::json!({
            "nodes": graph.nodes,
            "edges": graph.edges,
            "waves": graph.waves,
            "outcomes": analysis.outcomes,
        });
        let record = ExecutionGraphRecord {
            id: Uuid::new_v4(),
            stack_id,
            execution_id,
            graph: snapshot,
            created_at: Utc::now(),
        };
        // Snapshots are best-effort observability, never cycle-fatal.
        if let Err(err) = self.executions.record_graph(&record).await {
            warn!(stack_id = %stack_id, error = %err, "failed to record execution graph");
        }
    }

    /// Run a full cycle for a stack if the lease is free. Returns the
    /// decision, or `None` when another cycle holds the lease.
    pub async fn try_run_chain(&self, stack_id: Uuid) -> DomainResult<Option<CycleDecision>> {
        match self
            .executions
            .try_begin(stack_id, self.config.stale_after)
            .await?
        {
            Some(execution) => {
                let decision = match self.run_chain(execution).await {
                    Ok(decision) => decision,
                    Err(err) => {
                        // Cycle-level error: the execution row must not be
                        // left dangling in `running`.
                        self.fail_latest(stack_id, &err).await;
                        return Err(err);
                    }
                };
                Ok(Some(decision))
            }
            None => Ok(None),
        }
    }

    /// Finalize the dangling `running` row after the scheduler cancelled
    /// a chain at its deadline. The dropped chain future can no longer
    /// patch its own execution, so the scheduler patches it here.
    pub async fn fail_after_deadline(&self, stack_id: Uuid, deadline: Duration) {
        self.fail_latest(stack_id, &DomainError::Timeout(deadline.as_secs()))
            .await;
    }

    /// Mark the newest running execution failed after a cycle-level error.
    async fn fail_latest(&self, stack_id: Uuid, err: &DomainError) {
        let Ok(Some(mut latest)) = self.executions.latest(stack_id).await else {
            return;
        };
        if latest.status != CycleStatus::Running {
            return;
        }
        latest.status = CycleStatus::Failed;
        latest.completed_at = Some(Utc::now());
        latest.error = Some(err.to_string());
        latest.decision = Some(CycleDecision::pause(
            Duration::from_secs(5),
            "cycle failed",
        ));
        latest.pause_duration_ms = Some(5000);
        if let Err(finalize_err) = self.executions.finalize(&latest).await {
            warn!(stack_id = %stack_id, error = %finalize_err, "failed to finalize errored cycle");
        }
    }
}

/// Map an execution analysis onto the cycle status and next decision.
fn decide(analysis: &ExecutionAnalysis) -> (CycleStatus, CycleDecision) {
    if analysis.failure_count > 0 {
        return (
            CycleStatus::Failed,
            CycleDecision::pause(Duration::from_secs(5), "agent failures"),
        );
    }
    if analysis.success_count > 0 && analysis.ran(AgentType::Planner) {
        // The planner likely produced new work; run again immediately.
        return (CycleStatus::Completed, CycleDecision::Continue);
    }
    if analysis.success_count > 0 {
        return (
            CycleStatus::Completed,
            CycleDecision::pause(Duration::from_secs(1), "brief stabilization"),
        );
    }
    (
        CycleStatus::Completed,
        CycleDecision::pause(Duration::from_secs(5), "no effective work"),
    )
}

fn collect_errors(analysis: &ExecutionAnalysis) -> Option<String> {
    let errors: Vec<String> = analysis
        .outcomes
        .iter()
        .filter_map(|(agent, outcome)| match outcome {
            NodeOutcome::Failure { error } => Some(format!("{agent}: {error}")),
            _ => None,
        })
        .collect();
    if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AgentWork;

    fn analysis(success: usize, failure: usize, agents: Vec<AgentType>) -> ExecutionAnalysis {
        ExecutionAnalysis {
            success_count: success,
            failure_count: failure,
            agents_run: agents,
            ..Default::default()
        }
    }

    #[test]
    fn test_adaptive_pause_tiers() {
        let mut status = WorkStatus::default();
        assert_eq!(adaptive_pause(&status), Duration::from_secs(10));

        status.reviewer = AgentWork::some(4, "stale");
        assert_eq!(adaptive_pause(&status), Duration::from_secs(5));

        status.planner = AgentWork::some(9, "no todos");
        assert_eq!(adaptive_pause(&status), Duration::from_secs(1));
    }

    #[test]
    fn test_failures_pause_five_seconds() {
        let (status, decision) = decide(&analysis(1, 1, vec![AgentType::Builder]));
        assert_eq!(status, CycleStatus::Failed);
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

    #[test]
    fn test_planner_success_continues() {
        let (status, decision) = decide(&analysis(1, 0, vec![AgentType::Planner]));
        assert_eq!(status, CycleStatus::Completed);
        assert_eq!(decision, CycleDecision::Continue);
    }

    #[test]
    fn test_non_planner_success_pauses_briefly() {
        let (_, decision) = decide(&analysis(2, 0, vec![AgentType::Builder, AgentType::Reviewer]));
        match decision {
            CycleDecision::Pause { duration_ms, .. } => assert_eq!(duration_ms, 1000),
            other => panic!("unexpected decision: {other:?}"),
        }
    }

    #[test]
    fn test_all_skipped_pauses() {
        let (status, decision) = decide(&analysis(0, 0, vec![]));
        assert_eq!(status, CycleStatus::Completed);
        match decision {
            CycleDecision::Pause { duration_ms, .. } => assert_eq!(duration_ms, 5000),
            other => panic!("unexpected decision: {other:?}"),
        }
    }
}
