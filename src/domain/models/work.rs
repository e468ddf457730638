//! Work detection domain types.
//!
//! `WorkStatus` is the pure output of the work detector: per-agent
//! eligibility and priority derived from a stack snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::models::{
    AgentState, AgentType, Artifact, Message, ProjectIdea, Stack, Todo, UserMessage,
};

/// Priority scale bounds: 0 = no work, 10 = critical.
pub const WORK_PRIORITY_MAX: u8 = 10;

/// How long a cached work detection result stays valid.
pub const WORK_CACHE_TTL: Duration = Duration::from_secs(5);

/// Eligibility and priority for one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentWork {
    pub has_work: bool,
    /// 0-10; 0 means no work.
    pub priority: u8,
    pub reason: String,
    /// Agents that should run in an earlier wave than this one.
    pub dependencies: Vec<AgentType>,
}

impl AgentWork {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn some(priority: u8, reason: impl Into<String>) -> Self {
        Self {
            has_work: true,
            priority: priority.min(WORK_PRIORITY_MAX),
            reason: reason.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dep: AgentType) -> Self {
        self.dependencies.push(dep);
        self
    }
}

/// Per-agent work signals for a stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkStatus {
    pub planner: AgentWork,
    pub builder: AgentWork,
    pub communicator: AgentWork,
    pub reviewer: AgentWork,
}

impl WorkStatus {
    pub fn get(&self, agent: AgentType) -> &AgentWork {
        match agent {
            AgentType::Planner => &self.planner,
            AgentType::Builder => &self.builder,
            AgentType::Communicator => &self.communicator,
            AgentType::Reviewer => &self.reviewer,
        }
    }

    /// Agents that currently have work, in canonical role order.
    pub fn eligible(&self) -> Vec<AgentType> {
        AgentType::ALL
            .into_iter()
            .filter(|a| self.get(*a).has_work)
            .collect()
    }

    pub fn has_any_work(&self) -> bool {
        AgentType::ALL.into_iter().any(|a| self.get(a).has_work)
    }

    /// Highest priority across all agents; drives the adaptive pause.
    pub fn max_priority(&self) -> u8 {
        AgentType::ALL
            .into_iter()
            .map(|a| self.get(a).priority)
            .max()
            .unwrap_or(0)
    }
}

/// Snapshot of everything the work detector looks at, fetched once per
/// cycle via parallel queries.
#[derive(Debug, Clone)]
pub struct WorkContext {
    pub stack: Stack,
    pub todos: Vec<Todo>,
    /// Peer messages addressed to or broadcast at this stack, not yet read
    /// by it, and not sent by it.
    pub unread_messages: Vec<Message>,
    pub latest_artifact: Option<Artifact>,
    pub project_idea: Option<ProjectIdea>,
    pub agent_states: Vec<AgentState>,
    pub unprocessed_user_messages: Vec<UserMessage>,
    /// The instant the snapshot was taken; all staleness math uses this.
    pub now: DateTime<Utc>,
}

impl WorkContext {
    pub fn agent_state(&self, agent: AgentType) -> Option<&AgentState> {
        self.agent_states.iter().find(|s| s.agent_type == agent)
    }

    pub fn pending_todos(&self) -> impl Iterator<Item = &Todo> {
        self.todos
            .iter()
            .filter(|t| t.status == crate::domain::models::TodoStatus::Pending)
    }
}

/// Cached work detection result for a stack. Advisory only; readers must
/// ignore entries past `valid_until`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkDetectionCache {
    pub stack_id: Uuid,
    pub status: WorkStatus,
    pub computed_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl WorkDetectionCache {
    pub fn new(stack_id: Uuid, status: WorkStatus, computed_at: DateTime<Utc>) -> Self {
        let ttl = chrono::Duration::from_std(WORK_CACHE_TTL).unwrap_or(chrono::Duration::seconds(5));
        Self {
            stack_id,
            status,
            computed_at,
            valid_until: computed_at + ttl,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.valid_until > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_capped() {
        let work = AgentWork::some(99, "over the top");
        assert_eq!(work.priority, WORK_PRIORITY_MAX);
    }

    #[test]
    fn test_eligible_order_is_canonical() {
        let status = WorkStatus {
            reviewer: AgentWork::some(6, "new artifact"),
            planner: AgentWork::some(10, "no project idea"),
            ..Default::default()
        };
        assert_eq!(
            status.eligible(),
            vec![AgentType::Planner, AgentType::Reviewer]
        );
        assert_eq!(status.max_priority(), 10);
    }

    #[test]
    fn test_cache_freshness() {
        let now = Utc::now();
        let cache = WorkDetectionCache::new(Uuid::new_v4(), WorkStatus::default(), now);
        assert!(cache.is_fresh(now));
        assert!(!cache.is_fresh(now + chrono::Duration::seconds(6)));
        assert_eq!(
            cache.valid_until - cache.computed_at,
            chrono::Duration::seconds(5)
        );
    }
}
