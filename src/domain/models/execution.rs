//! Orchestrator execution records and the pause/continue decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Status of one orchestrator cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Running,
    Completed,
    Paused,
    Failed,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "paused" => Some(Self::Paused),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// What the orchestrator decided to do after a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleDecision {
    /// Run another cycle immediately.
    Continue,
    /// Wait for the scheduler; duration is advisory back-pressure.
    Pause { duration_ms: u64, reason: String },
    /// The stack is no longer runnable.
    Stop { reason: String },
}

impl CycleDecision {
    pub fn pause(duration: Duration, reason: impl Into<String>) -> Self {
        Self::Pause {
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            reason: reason.into(),
        }
    }

    pub fn stop(reason: impl Into<String>) -> Self {
        Self::Stop {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Pause { .. } => "pause",
            Self::Stop { .. } => "stop",
        }
    }
}

/// Compact per-cycle summary persisted on the execution row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub node_count: usize,
    pub wave_count: usize,
    pub agents_run: Vec<String>,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    /// Widest wave dispatched concurrently.
    pub parallel_executions: usize,
}

/// One orchestrator cycle for a stack. The `running` row doubles as the
/// single-flight lease: at most one exists per stack at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorExecution {
    pub id: Uuid,
    pub stack_id: Uuid,
    pub status: CycleStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub decision: Option<CycleDecision>,
    pub pause_duration_ms: Option<u64>,
    pub graph_summary: Option<GraphSummary>,
    pub error: Option<String>,
}

impl OrchestratorExecution {
    pub fn begin(stack_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            stack_id,
            status: CycleStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            decision: None,
            pause_duration_ms: None,
            graph_summary: None,
            error: None,
        }
    }

    /// Age of the cycle, saturating at zero for clock skew.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.started_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Per-cycle graph snapshot for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionGraphRecord {
    pub id: Uuid,
    pub stack_id: Uuid,
    pub execution_id: Uuid,
    /// Serialized graph with per-node outcomes.
    pub graph: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Aggregate orchestration statistics over a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationStats {
    pub total_cycles: u64,
    pub completed_cycles: u64,
    pub failed_cycles: u64,
    pub avg_cycle_duration_ms: f64,
    pub continue_decisions: u64,
    pub pause_decisions: u64,
    pub avg_parallel_executions: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_kind() {
        assert_eq!(CycleDecision::Continue.kind(), "continue");
        assert_eq!(
            CycleDecision::pause(Duration::from_secs(5), "agent failures").kind(),
            "pause"
        );
        assert_eq!(CycleDecision::stop("stack stopped").kind(), "stop");
    }

    #[test]
    fn test_cycle_age() {
        let mut exec = OrchestratorExecution::begin(Uuid::new_v4());
        exec.started_at = Utc::now() - chrono::Duration::seconds(65);
        assert!(exec.age(Utc::now()) >= Duration::from_secs(65));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!CycleStatus::Running.is_terminal());
        assert!(CycleStatus::Completed.is_terminal());
        assert!(CycleStatus::Paused.is_terminal());
        assert!(CycleStatus::Failed.is_terminal());
    }
}
