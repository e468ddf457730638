//! Ports: interfaces between the domain and the adapters.

mod agent_state_repository;
mod artifact_repository;
mod chat_provider;
mod execution_repository;
mod message_repository;
mod stack_repository;
mod todo_repository;

pub use agent_state_repository::AgentStateRepository;
pub use artifact_repository::{ArtifactRepository, ProjectIdeaRepository, TraceRepository};
pub use chat_provider::ChatProvider;
pub use execution_repository::ExecutionRepository;
pub use message_repository::{MessageRepository, UserMessageRepository};
pub use stack_repository::StackRepository;
pub use todo_repository::TodoRepository;
