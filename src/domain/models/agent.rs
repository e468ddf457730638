//! Agent state domain model.
//!
//! Each stack owns four agent states, one per role. Memory is a tagged
//! union so cross-agent hand-off keys (reviewer recommendations, last
//! reviewed version) are explicit fields rather than an untyped bag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four agent roles of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Planner,
    Builder,
    Communicator,
    Reviewer,
}

impl AgentType {
    pub const ALL: [AgentType; 4] = [
        Self::Planner,
        Self::Builder,
        Self::Communicator,
        Self::Reviewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Builder => "builder",
            Self::Communicator => "communicator",
            Self::Reviewer => "reviewer",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "planner" => Some(Self::Planner),
            "builder" => Some(Self::Builder),
            "communicator" => Some(Self::Communicator),
            "reviewer" => Some(Self::Reviewer),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an agent is currently executing inside a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRunState {
    Idle,
    Executing,
    Error,
}

impl Default for AgentRunState {
    fn default() -> Self {
        Self::Idle
    }
}

impl AgentRunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Executing => "executing",
            Self::Error => "error",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "executing" => Some(Self::Executing),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Planner memory: planning timers and reviewer hand-off.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerMemory {
    pub last_planning_time: Option<DateTime<Utc>>,
    /// Recommendations handed off by the reviewer; consumed (cleared) by
    /// the next planner run.
    pub reviewer_recommendations: Vec<String>,
    pub recommendations_timestamp: Option<DateTime<Utc>>,
    pub recommendations_type: Option<String>,
}

/// Builder memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderMemory {
    pub last_build_time: Option<DateTime<Utc>>,
    pub artifacts_built: u64,
}

/// Communicator memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunicatorMemory {
    pub last_message_time: Option<DateTime<Utc>>,
    pub user_messages_processed: u64,
}

/// Reviewer memory: review timers and the version watermark that keeps
/// the reviewer from re-reviewing the same artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewerMemory {
    pub last_review_time: Option<DateTime<Utc>>,
    pub last_reviewed_version: Option<i64>,
    pub last_review_issues_count: Option<u32>,
    /// Top recommendations from the most recent review (capped at 10).
    pub recommendations: Vec<String>,
}

/// Role-specific memory, tagged by agent type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMemory {
    Planner(PlannerMemory),
    Builder(BuilderMemory),
    Communicator(CommunicatorMemory),
    Reviewer(ReviewerMemory),
}

impl AgentMemory {
    /// Fresh memory for an agent role.
    pub fn empty_for(agent: AgentType) -> Self {
        match agent {
            AgentType::Planner => Self::Planner(PlannerMemory::default()),
            AgentType::Builder => Self::Builder(BuilderMemory::default()),
            AgentType::Communicator => Self::Communicator(CommunicatorMemory::default()),
            AgentType::Reviewer => Self::Reviewer(ReviewerMemory::default()),
        }
    }

    pub fn agent_type(&self) -> AgentType {
        match self {
            Self::Planner(_) => AgentType::Planner,
            Self::Builder(_) => AgentType::Builder,
            Self::Communicator(_) => AgentType::Communicator,
            Self::Reviewer(_) => AgentType::Reviewer,
        }
    }

    pub fn as_planner(&self) -> Option<&PlannerMemory> {
        match self {
            Self::Planner(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_reviewer(&self) -> Option<&ReviewerMemory> {
        match self {
            Self::Reviewer(m) => Some(m),
            _ => None,
        }
    }
}

/// A short-term context entry: one recent thought.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thought {
    pub at: DateTime<Utc>,
    pub text: String,
}

/// Maximum thoughts retained in an agent's short-term context.
pub const CONTEXT_CAPACITY: usize = 20;

/// Per-(stack, role) agent state row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub id: Uuid,
    pub stack_id: Uuid,
    pub agent_type: AgentType,
    pub run_state: AgentRunState,
    /// Human-readable description of what the agent is doing right now.
    pub current_work: Option<String>,
    pub memory: AgentMemory,
    pub context: Vec<Thought>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentState {
    pub fn new(stack_id: Uuid, agent_type: AgentType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            stack_id,
            agent_type,
            run_state: AgentRunState::Idle,
            current_work: None,
            memory: AgentMemory::empty_for(agent_type),
            context: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a thought, evicting the oldest past capacity.
    pub fn push_thought(&mut self, text: impl Into<String>) {
        self.context.push(Thought {
            at: Utc::now(),
            text: text.into(),
        });
        if self.context.len() > CONTEXT_CAPACITY {
            let excess = self.context.len() - CONTEXT_CAPACITY;
            self.context.drain(..excess);
        }
    }
}
