//! Artifact, trace and project-idea repository ports.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentTrace, Artifact, ProjectIdea};

/// Repository interface for append-only artifacts.
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Append a new artifact, assigning `version = latest + 1` atomically.
    /// Returns the stored artifact with its version filled in.
    async fn append(&self, artifact: &Artifact) -> DomainResult<Artifact>;

    /// Latest artifact of a stack, if any.
    async fn latest(&self, stack_id: Uuid) -> DomainResult<Option<Artifact>>;

    /// Get an artifact by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Artifact>>;

    /// A stack's artifacts, newest first, capped at `limit`.
    async fn list_for_stack(&self, stack_id: Uuid, limit: usize) -> DomainResult<Vec<Artifact>>;
}

/// Repository interface for append-only agent traces.
#[async_trait]
pub trait TraceRepository: Send + Sync {
    /// Append a trace.
    async fn append(&self, trace: &AgentTrace) -> DomainResult<()>;

    /// Recent traces for a stack, newest first.
    async fn recent(&self, stack_id: Uuid, limit: usize) -> DomainResult<Vec<AgentTrace>>;
}

/// Repository interface for the per-stack project idea.
#[async_trait]
pub trait ProjectIdeaRepository: Send + Sync {
    /// Insert or update the stack's project idea.
    async fn upsert(&self, idea: &ProjectIdea) -> DomainResult<()>;

    /// Get the stack's project idea, if decided.
    async fn get_for_stack(&self, stack_id: Uuid) -> DomainResult<Option<ProjectIdea>>;
}
