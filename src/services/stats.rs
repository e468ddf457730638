//! Orchestration statistics over a trailing window.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CycleDecision, CycleStatus, OrchestrationStats, OrchestratorExecution};
use crate::domain::ports::ExecutionRepository;

/// Aggregate a window of execution rows into the stats shape.
pub fn compute(executions: &[OrchestratorExecution]) -> OrchestrationStats {
    let mut stats = OrchestrationStats {
        total_cycles: executions.len() as u64,
        ..Default::default()
    };

    let mut duration_sum_ms = 0f64;
    let mut duration_count = 0u64;
    let mut parallel_sum = 0f64;
    let mut parallel_count = 0u64;

    for execution in executions {
        match execution.status {
            CycleStatus::Completed => stats.completed_cycles += 1,
            CycleStatus::Failed => stats.failed_cycles += 1,
            _ => {}
        }

        match &execution.decision {
            Some(CycleDecision::Continue) => stats.continue_decisions += 1,
            Some(CycleDecision::Pause { .. }) => stats.pause_decisions += 1,
            _ => {}
        }

        if let Some(completed_at) = execution.completed_at {
            let ms = (completed_at - execution.started_at).num_milliseconds();
            if ms >= 0 {
                duration_sum_ms += ms as f64;
                duration_count += 1;
            }
        }

        if let Some(summary) = &execution.graph_summary {
            parallel_sum += summary.parallel_executions as f64;
            parallel_count += 1;
        }
    }

    if duration_count > 0 {
        stats.avg_cycle_duration_ms = duration_sum_ms / duration_count as f64;
    }
    if parallel_count > 0 {
        stats.avg_parallel_executions = parallel_sum / parallel_count as f64;
    }

    stats
}

/// Repository-backed stats lookups for the observability surface.
pub struct StatsService {
    executions: Arc<dyn ExecutionRepository>,
}

impl StatsService {
    pub fn new(executions: Arc<dyn ExecutionRepository>) -> Self {
        Self { executions }
    }

    pub async fn orchestration_stats(
        &self,
        stack_id: Uuid,
        window: Duration,
    ) -> DomainResult<OrchestrationStats> {
        let executions = self.executions.within_window(stack_id, window).await?;
        Ok(compute(&executions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::GraphSummary;
    use chrono::Utc;

    fn execution(
        status: CycleStatus,
        decision: Option<CycleDecision>,
        duration_ms: i64,
        parallel: Option<usize>,
    ) -> OrchestratorExecution {
        let started = Utc::now() - chrono::Duration::milliseconds(duration_ms);
        let mut execution = OrchestratorExecution::begin(Uuid::new_v4());
        execution.status = status;
        execution.started_at = started;
        execution.completed_at = Some(started + chrono::Duration::milliseconds(duration_ms));
        execution.decision = decision;
        execution.graph_summary = parallel.map(|p| GraphSummary {
            parallel_executions: p,
            ..Default::default()
        });
        execution
    }

    #[test]
    fn test_compute_over_mixed_window() {
        let executions = vec![
            execution(
                CycleStatus::Completed,
                Some(CycleDecision::Continue),
                100,
                Some(2),
            ),
            execution(
                CycleStatus::Completed,
                Some(CycleDecision::pause(Duration::from_secs(1), "stabilize")),
                300,
                Some(4),
            ),
            execution(
                CycleStatus::Failed,
                Some(CycleDecision::pause(Duration::from_secs(5), "agent failures")),
                200,
                None,
            ),
        ];

        let stats = compute(&executions);
        assert_eq!(stats.total_cycles, 3);
        assert_eq!(stats.completed_cycles, 2);
        assert_eq!(stats.failed_cycles, 1);
        assert_eq!(stats.continue_decisions, 1);
        assert_eq!(stats.pause_decisions, 2);
        assert!((stats.avg_cycle_duration_ms - 200.0).abs() < 10.0);
        assert!((stats.avg_parallel_executions - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_compute_empty_window() {
        let stats = compute(&[]);
        assert_eq!(stats, OrchestrationStats::default());
    }
}
