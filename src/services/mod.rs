//! Services: the orchestration core and its supporting pieces.

pub mod admin;
pub mod config;
pub mod graph_builder;
pub mod graph_executor;
pub mod orchestrator;
pub mod scheduler;
pub mod stats;
pub mod work_detector;

pub use admin::AdminService;
pub use config::{Config, ConfigError, ConfigLoader};
pub use graph_executor::{ExecutorConfig, GraphExecutor};
pub use orchestrator::{adaptive_pause, Orchestrator, OrchestratorConfig};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use stats::StatsService;
pub use work_detector::WorkDetector;
