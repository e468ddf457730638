//! Command-line interface and application wiring.

pub mod commands;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::http::AppState;
use crate::adapters::llm::LlmGateway;
use crate::adapters::sqlite::{
    apply_schema, open, SqliteAgentStateRepository, SqliteArtifactRepository,
    SqliteExecutionRepository, SqliteMessageRepository, SqliteProjectIdeaRepository,
    SqliteStackRepository, SqliteTodoRepository, SqliteTraceRepository,
    SqliteUserMessageRepository,
};
use crate::agents::{build_runners, RunnerContext};
use crate::domain::ports::ExecutionRepository;
use crate::services::{
    AdminService, Config, ExecutorConfig, GraphExecutor, Orchestrator, OrchestratorConfig,
    Scheduler, SchedulerConfig, StatsService, WorkDetector,
};

#[derive(Debug, Parser)]
#[command(name = "stackhive", about = "Autonomous multi-agent hackathon simulator", version)]
pub struct Cli {
    /// Emit JSON instead of tables.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the scheduler and HTTP API until interrupted.
    Serve,
    /// Manage stacks (teams).
    #[command(subcommand)]
    Stack(StackCommands),
    /// Visitor chat with a team.
    #[command(subcommand)]
    Chat(ChatCommands),
}

#[derive(Debug, Subcommand)]
pub enum StackCommands {
    /// Create a stack for a participant.
    Create { participant_name: String },
    /// List all stacks.
    List,
    /// Show one stack with its latest cycle.
    Status { stack_id: Uuid },
    /// Start autonomous execution.
    Start { stack_id: Uuid },
    /// Pause execution.
    Pause { stack_id: Uuid },
    /// Resume a paused stack.
    Resume { stack_id: Uuid },
    /// Stop execution permanently.
    Stop { stack_id: Uuid },
    /// Delete a stack and everything it owns.
    Delete { stack_id: Uuid },
    /// Recent traces for a stack.
    Traces {
        stack_id: Uuid,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Debug, Subcommand)]
pub enum ChatCommands {
    /// Send a visitor message to a team.
    Send {
        stack_id: Uuid,
        #[arg(long, default_value = "visitor")]
        sender: String,
        content: String,
    },
    /// Show a team's chat history.
    History {
        stack_id: Uuid,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

/// The wired application: repositories, services, scheduler.
pub struct App {
    pub config: Config,
    pub ctx: Arc<RunnerContext>,
    pub executions: Arc<dyn ExecutionRepository>,
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Arc<Scheduler>,
}

impl App {
    /// Open the store, apply the schema, and wire everything from
    /// configuration.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let pool = open(&config.database.path).await?;
        apply_schema(&pool).await?;

        let gateway = Arc::new(LlmGateway::from_env(config.llm.provider_order.clone()));
        if gateway.is_empty() {
            tracing::warn!(
                "no LLM provider keys found; agent cycles will fail until one is configured"
            );
        } else {
            tracing::info!(providers = ?gateway.provider_names(), "llm gateway ready");
        }

        let ctx = Arc::new(RunnerContext {
            stacks: Arc::new(SqliteStackRepository::new(pool.clone())),
            agent_states: Arc::new(SqliteAgentStateRepository::new(pool.clone())),
            todos: Arc::new(SqliteTodoRepository::new(pool.clone())),
            projects: Arc::new(SqliteProjectIdeaRepository::new(pool.clone())),
            messages: Arc::new(SqliteMessageRepository::new(pool.clone())),
            user_messages: Arc::new(SqliteUserMessageRepository::new(pool.clone())),
            artifacts: Arc::new(SqliteArtifactRepository::new(pool.clone())),
            traces: Arc::new(SqliteTraceRepository::new(pool.clone())),
            gateway,
            llm_timeout: config.llm.request_timeout(),
            builder_llm_timeout: config.llm.builder_request_timeout(),
        });

        let executions: Arc<dyn ExecutionRepository> =
            Arc::new(SqliteExecutionRepository::new(pool));

        let detector = WorkDetector::new(ctx.clone(), executions.clone());
        let executor = GraphExecutor::new(
            ctx.clone(),
            build_runners(ctx.clone()),
            ExecutorConfig {
                node_timeout: config.scheduler.node_timeout(),
            },
        );
        let orchestrator = Arc::new(Orchestrator::new(
            ctx.clone(),
            detector,
            executor,
            executions.clone(),
            OrchestratorConfig {
                stale_after: config.scheduler.stale_after(),
                max_continues: config.scheduler.max_continues,
            },
        ));
        let scheduler = Arc::new(Scheduler::new(
            ctx.stacks.clone(),
            orchestrator.clone(),
            SchedulerConfig {
                tick_interval: config.scheduler.tick_interval(),
                cycle_deadline: config.scheduler.cycle_deadline(),
                drain_timeout: config.scheduler.drain_timeout(),
            },
        ));

        Ok(Self {
            config,
            ctx,
            executions,
            orchestrator,
            scheduler,
        })
    }

    pub fn admin(&self) -> AdminService {
        AdminService::new(self.ctx.clone())
    }

    /// Handler state for the HTTP server.
    pub fn http_state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            admin: AdminService::new(self.ctx.clone()),
            detector: Arc::new(WorkDetector::new(self.ctx.clone(), self.executions.clone())),
            stats: StatsService::new(self.executions.clone()),
            executions: self.executions.clone(),
            traces: self.ctx.traces.clone(),
        })
    }
}
