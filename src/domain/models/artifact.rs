//! Artifact and trace domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::AgentType;

/// A versioned build output. Append-only; versions are strictly
/// monotonic per stack, starting at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub stack_id: Uuid,
    pub version: i64,
    pub artifact_type: String,
    pub content: String,
    pub created_by: AgentType,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// A new HTML artifact draft; version is assigned by the repository
    /// at insert time.
    pub fn html(stack_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            stack_id,
            version: 0,
            artifact_type: "html".to_string(),
            content: content.into(),
            created_by: AgentType::Builder,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }
}

/// Observability record of one agent's thought/action/result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTrace {
    pub id: Uuid,
    pub stack_id: Uuid,
    pub agent_type: AgentType,
    pub thought: String,
    pub action: String,
    pub result: String,
    pub created_at: DateTime<Utc>,
}

/// Maximum chars of model thinking persisted on a trace.
pub const TRACE_THOUGHT_MAX_CHARS: usize = 1000;

impl AgentTrace {
    /// Build a trace, truncating the thought at the persistence cap.
    pub fn new(
        stack_id: Uuid,
        agent_type: AgentType,
        thought: impl Into<String>,
        action: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        let mut thought: String = thought.into();
        if thought.chars().count() > TRACE_THOUGHT_MAX_CHARS {
            thought = thought.chars().take(TRACE_THOUGHT_MAX_CHARS).collect();
        }
        Self {
            id: Uuid::new_v4(),
            stack_id,
            agent_type,
            thought,
            action: action.into(),
            result: result.into(),
            created_at: Utc::now(),
        }
    }
}
