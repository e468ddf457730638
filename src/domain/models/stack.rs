//! Stack domain model.
//!
//! A stack is one simulated hackathon team: one participant, four agents,
//! one project idea, one artifact series.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hackathon phase a stack is in. Advanced by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackPhase {
    Ideation,
    Building,
    Demo,
    Completed,
}

impl Default for StackPhase {
    fn default() -> Self {
        Self::Ideation
    }
}

impl StackPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ideation => "ideation",
            Self::Building => "building",
            Self::Demo => "demo",
            Self::Completed => "completed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ideation" => Some(Self::Ideation),
            "building" => Some(Self::Building),
            "demo" => Some(Self::Demo),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Whether the orchestrator should be driving this stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Created but never started.
    Idle,
    /// Scheduler picks this stack up every tick.
    Running,
    /// Temporarily halted by the operator; resumable.
    Paused,
    /// Terminal for scheduling purposes.
    Stopped,
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Valid operator transitions from this state.
    pub fn valid_transitions(&self) -> &'static [ExecutionState] {
        match self {
            Self::Idle => &[Self::Running, Self::Stopped],
            Self::Running => &[Self::Paused, Self::Stopped],
            Self::Paused => &[Self::Running, Self::Stopped],
            Self::Stopped => &[],
        }
    }

    pub fn can_transition_to(&self, new_state: Self) -> bool {
        self.valid_transitions().contains(&new_state)
    }
}

/// A hackathon team driven by four cooperating agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stack {
    pub id: Uuid,
    pub participant_name: String,
    pub phase: StackPhase,
    pub execution_state: ExecutionState,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub total_cycles: u64,
    pub created_at: DateTime<Utc>,
}

impl Stack {
    pub fn new(participant_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant_name: participant_name.into(),
            phase: StackPhase::default(),
            execution_state: ExecutionState::default(),
            last_activity_at: None,
            total_cycles: 0,
            created_at: Utc::now(),
        }
    }
}

/// The project a stack has settled on. Upserted by the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectIdea {
    pub id: Uuid,
    pub stack_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectIdea {
    pub fn new(stack_id: Uuid, title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            stack_id,
            title: title.into(),
            description: description.into(),
            status: "active".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_state_transitions() {
        assert!(ExecutionState::Idle.can_transition_to(ExecutionState::Running));
        assert!(ExecutionState::Running.can_transition_to(ExecutionState::Paused));
        assert!(ExecutionState::Paused.can_transition_to(ExecutionState::Running));
        assert!(ExecutionState::Running.can_transition_to(ExecutionState::Stopped));
        assert!(!ExecutionState::Stopped.can_transition_to(ExecutionState::Running));
        assert!(!ExecutionState::Idle.can_transition_to(ExecutionState::Paused));
    }

    #[test]
    fn test_phase_round_trip() {
        for phase in [
            StackPhase::Ideation,
            StackPhase::Building,
            StackPhase::Demo,
            StackPhase::Completed,
        ] {
            assert_eq!(StackPhase::from_str(phase.as_str()), Some(phase));
        }
        assert_eq!(StackPhase::from_str("judging"), None);
    }

    #[test]
    fn test_new_stack_defaults() {
        let stack = Stack::new("Team Rocket");
        assert_eq!(stack.phase, StackPhase::Ideation);
        assert_eq!(stack.execution_state, ExecutionState::Idle);
        assert_eq!(stack.total_cycles, 0);
        assert!(stack.last_activity_at.is_none());
    }
}
