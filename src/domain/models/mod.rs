//! Domain models for the stackhive system.

mod agent;
mod artifact;
mod chat;
mod execution;
mod graph;
mod message;
mod stack;
mod todo;
mod work;

pub use agent::{
    AgentMemory, AgentRunState, AgentState, AgentType, BuilderMemory, CommunicatorMemory,
    PlannerMemory, ReviewerMemory, Thought, CONTEXT_CAPACITY,
};
pub use artifact::{AgentTrace, Artifact, TRACE_THOUGHT_MAX_CHARS};
pub use chat::{ChatMessage, ChatOptions, ChatResponse, ChatRole, ChatUsage, JsonSchema};
pub use execution::{
    CycleDecision, CycleStatus, ExecutionGraphRecord, GraphSummary, OrchestrationStats,
    OrchestratorExecution,
};
pub use graph::{AgentGraph, ExecutionAnalysis, GraphEdge, GraphNode, NodeOutcome};
pub use message::{Message, MessageType, UserMessage};
pub use stack::{ExecutionState, ProjectIdea, Stack, StackPhase};
pub use todo::{Todo, TodoStatus, TODO_PRIORITY_DEFAULT, TODO_PRIORITY_MAX, TODO_PRIORITY_MIN};
pub use work::{
    AgentWork, WorkContext, WorkDetectionCache, WorkStatus, WORK_CACHE_TTL, WORK_PRIORITY_MAX,
};
