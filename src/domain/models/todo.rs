//! Todo domain model.
//!
//! Todos are created by the planner and worked off by the builder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::AgentType;

/// Status of a todo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl Default for TodoStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TodoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [TodoStatus] {
        match self {
            Self::Pending => &[Self::InProgress, Self::Cancelled],
            Self::InProgress => &[Self::Completed, Self::Cancelled],
            Self::Completed => &[],
            Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Lowest and highest todo priorities.
pub const TODO_PRIORITY_MIN: i64 = 1;
pub const TODO_PRIORITY_MAX: i64 = 10;
/// Priority used when the planner's output omits one.
pub const TODO_PRIORITY_DEFAULT: i64 = 5;

/// A unit of build work owned by a stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub stack_id: Uuid,
    pub content: String,
    pub status: TodoStatus,
    /// 1 (lowest) to 10 (highest).
    pub priority: i64,
    pub assigned_by: AgentType,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Todo {
    pub fn new(stack_id: Uuid, content: impl Into<String>, priority: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            stack_id,
            content: content.into(),
            status: TodoStatus::Pending,
            priority: priority.clamp(TODO_PRIORITY_MIN, TODO_PRIORITY_MAX),
            assigned_by: AgentType::Planner,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}
