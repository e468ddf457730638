//! Shared integration-test harness.

pub mod database;

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use stackhive::adapters::llm::{LlmGateway, MockChatProvider};
use stackhive::adapters::sqlite::{
    SqliteAgentStateRepository, SqliteArtifactRepository, SqliteExecutionRepository,
    SqliteMessageRepository, SqliteProjectIdeaRepository, SqliteStackRepository,
    SqliteTodoRepository, SqliteTraceRepository, SqliteUserMessageRepository,
};
use stackhive::agents::{build_runners, RunnerContext};
use stackhive::domain::models::{
    AgentMemory, AgentType, Artifact, CycleDecision, OrchestratorExecution, PlannerMemory,
    ProjectIdea, ReviewerMemory, Stack, Todo,
};
use stackhive::domain::ports::{
    AgentStateRepository, ArtifactRepository, ExecutionRepository, ProjectIdeaRepository,
    TodoRepository,
};
use stackhive::services::{
    AdminService, ExecutorConfig, GraphExecutor, Orchestrator, OrchestratorConfig, Scheduler,
    SchedulerConfig, WorkDetector,
};

/// A fully wired in-memory application with a scripted LLM.
#[allow(dead_code)]
pub struct TestHarness {
    pub pool: SqlitePool,
    pub ctx: Arc<RunnerContext>,
    pub mock: Arc<MockChatProvider>,
    pub executions: Arc<dyn ExecutionRepository>,
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Arc<Scheduler>,
}

#[allow(dead_code)]
impl TestHarness {
    pub async fn new() -> Self {
        let pool = database::setup_test_db().await;
        let mock = Arc::new(MockChatProvider::new());
        let gateway = Arc::new(LlmGateway::new(
            vec![mock.clone() as Arc<dyn stackhive::domain::ports::ChatProvider>],
            vec!["mock".to_string()],
        ));

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
            llm_timeout: Duration::from_secs(5),
            builder_llm_timeout: Duration::from_secs(5),
        });

        let executions: Arc<dyn ExecutionRepository> =
            Arc::new(SqliteExecutionRepository::new(pool.clone()));
        let detector = WorkDetector::new(ctx.clone(), executions.clone());
        let executor = GraphExecutor::new(
            ctx.clone(),
            build_runners(ctx.clone()),
            ExecutorConfig {
                node_timeout: Duration::from_secs(10),
            },
        );
        let orchestrator = Arc::new(Orchestrator::new(
            ctx.clone(),
            detector,
            executor,
            executions.clone(),
            OrchestratorConfig::default(),
        ));
        let scheduler = Arc::new(Scheduler::new(
            ctx.stacks.clone(),
            orchestrator.clone(),
            SchedulerConfig {
                tick_interval: Duration::from_millis(50),
                cycle_deadline: Duration::from_secs(30),
                drain_timeout: Duration::from_secs(30),
            },
        ));

        Self {
            pool,
            ctx,
            mock,
            executions,
            orchestrator,
            scheduler,
        }
    }

    pub fn admin(&self) -> AdminService {
        AdminService::new(self.ctx.clone())
    }

    /// Create a stack with seeded agent states, already running.
    pub async fn running_stack(&self, name: &str) -> Stack {
        let admin = self.admin();
        let stack = admin.create_stack(name).await.unwrap();
        admin.start_execution(stack.id).await.unwrap();
        admin.get_stack(stack.id).await.unwrap()
    }

    pub async fn seed_project(&self, stack_id: Uuid, title: &str) {
        self.ctx
            .projects
            .upsert(&ProjectIdea::new(stack_id, title, format!("{title} description")))
            .await
            .unwrap();
    }

    pub async fn seed_todo(&self, stack_id: Uuid, content: &str, priority: i64) -> Todo {
        let todo = Todo::new(stack_id, content, priority);
        self.ctx.todos.create(&todo).await.unwrap();
        todo
    }

    pub async fn seed_artifact(&self, stack_id: Uuid, content: &str) -> Artifact {
        self.ctx
            .artifacts
            .append(&Artifact::html(stack_id, content))
            .await
            .unwrap()
    }

    /// Mark the planner as having just planned, so staleness rules stay
    /// quiet in scenarios that focus on other agents.
    pub async fn set_planner_fresh(&self, stack_id: Uuid) {
        let mut state = self
            .ctx
            .agent_states
            .get(stack_id, AgentType::Planner)
            .await
            .unwrap()
            .unwrap();
        state.memory = AgentMemory::Planner(PlannerMemory {
            last_planning_time: Some(Utc::now()),
            ..Default::default()
        });
        self.ctx.agent_states.update(&state).await.unwrap();
    }

    pub async fn set_reviewer_memory(&self, stack_id: Uuid, memory: ReviewerMemory) {
        let mut state = self
            .ctx
            .agent_states
            .get(stack_id, AgentType::Reviewer)
            .await
            .unwrap()
            .unwrap();
        state.memory = AgentMemory::Reviewer(memory);
        self.ctx.agent_states.update(&state).await.unwrap();
    }

    pub async fn planner_memory(&self, stack_id: Uuid) -> PlannerMemory {
        let state = self
            .ctx
            .agent_states
            .get(stack_id, AgentType::Planner)
            .await
            .unwrap()
            .unwrap();
        match state.memory {
            AgentMemory::Planner(memory) => memory,
            other => panic!("unexpected memory: {other:?}"),
        }
    }

    /// Acquire the lease and run exactly one cycle.
    pub async fn run_single_cycle(
        &self,
        stack_id: Uuid,
    ) -> (OrchestratorExecution, CycleDecision) {
        let mut execution = self
            .executions
            .try_begin(stack_id, Duration::from_secs(60))
            .await
            .unwrap()
            .expect("lease should be free");
        let decision = self.orchestrator.run_cycle(&mut execution).await.unwrap();
        let reloaded = self
            .executions
            .get(execution.id)
            .await
            .unwrap()
            .expect("execution row exists");
        (reloaded, decision)
    }

    /// Drop the work detection cache so the next cycle re-detects.
    pub async fn expire_work_cache(&self, stack_id: Uuid) {
        sqlx::query("DELETE FROM work_detection_cache WHERE stack_id = ?")
            .bind(stack_id.to_string())
            .execute(&self.pool)
            .await
            .unwrap();
    }

    /// Age an execution row back in time, as if it had started earlier.
    pub async fn age_execution(&self, execution_id: Uuid, seconds: i64) {
        sqlx::query("UPDATE orchestrator_executions SET started_at = ? WHERE id = ?")
            .bind((Utc::now() - chrono::Duration::seconds(seconds)).to_rfc3339())
            .bind(execution_id.to_string())
            .execute(&self.pool)
            .await
            .unwrap();
    }
}

/// Canned structured replies for the scripted provider.
#[allow(dead_code)]
pub mod replies {
    pub fn planner_empty() -> String {
        r#"{"thinking": "holding course", "actions": []}"#.to_string()
    }

    pub fn planner_cold_start() -> String {
        serde_json::json!({
            "thinking": "We need a project and a starting backlog.",
            "actions": [
                {"type": "update_project", "title": "Pixel Garden", "description": "A relaxing plant-growing sim"},
                {"type": "create_todo", "content": "build landing page", "priority": 8},
                {"type": "create_todo", "content": "add watering mechanic", "priority": 6}
            ]
        })
        .to_string()
    }

    pub fn builder_artifact(html: &str) -> String {
        serde_json::json!({
            "thinking": "Shipping the page.",
            "results": {"artifact": html}
        })
        .to_string()
    }

    pub fn communicator_direct(message: &str, recipient: &str) -> String {
        serde_json::json!({
            "thinking": "A visitor deserves a quick answer.",
            "results": {"message": message, "recipient": recipient, "type": "direct"}
        })
        .to_string()
    }

    pub fn reviewer_audit(recommendations: &[&str]) -> String {
        serde_json::json!({
            "thinking": "Checking the latest build.",
            "results": {
                "recommendations": recommendations,
                "issues": [{"severity": "minor", "description": "missing alt text"}]
            }
        })
        .to_string()
    }
}
