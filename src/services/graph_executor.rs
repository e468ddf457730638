//! Graph executor: wave-sequential, node-parallel agent execution.
//!
//! Failures never cancel wave siblings and never abort later waves; a
//! later wave simply runs against whatever state resulted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::agents::{AgentRunner, RunOutcome, RunnerContext};
use crate::domain::errors::DomainResult;
use crate::domain::ports::{AgentStateRepository, StackRepository};
use crate::domain::models::{
    AgentGraph, AgentRunState, AgentType, ExecutionAnalysis, NodeOutcome,
};

/// Configuration for the graph executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Wall-clock budget per node.
    pub node_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            node_timeout: Duration::from_secs(60),
        }
    }
}

/// Runs agent graphs for one process.
pub struct GraphExecutor {
    ctx: Arc<RunnerContext>,
    runners: HashMap<AgentType, Arc<dyn AgentRunner>>,
    config: ExecutorConfig,
}

impl GraphExecutor {
    pub fn new(
        ctx: Arc<RunnerContext>,
        runners: HashMap<AgentType, Arc<dyn AgentRunner>>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            ctx,
            runners,
            config,
        }
    }

    /// Execute the graph wave by wave. Within a wave all nodes are
    /// dispatched concurrently; a wave completes when every node settles.
    #[instrument(skip(self, graph), fields(stack_id = %stack_id))]
    pub async fn execute(&self, stack_id: Uuid, graph: &AgentGraph) -> DomainResult<ExecutionAnalysis> {
        let mut analysis = ExecutionAnalysis {
            waves: graph.waves.len(),
            ..Default::default()
        };

        for wave in &graph.waves {
            analysis.parallel_executions = analysis.parallel_executions.max(wave.len());

            let mut handles = Vec::with_capacity(wave.len());
            for &agent in wave {
                let Some(node) = graph.node(agent) else {
                    continue;
                };
                let Some(runner) = self.runners.get(&agent) else {
                    warn!(agent = %agent, "no runner registered, node skipped");
                    analysis.outcomes.push((
                        agent,
                        NodeOutcome::Skipped {
                            reason: "no runner registered".to_string(),
                        },
                    ));
                    analysis.skipped_count += 1;
                    continue;
                };

                let ctx = self.ctx.clone();
                let runner = runner.clone();
                let reason = node.reason.clone();
                let node_timeout = self.config.node_timeout;

                handles.push(tokio::spawn(async move {
                    let outcome =
                        run_node(ctx, runner, stack_id, agent, &reason, node_timeout).await;
                    (agent, outcome)
                }));
            }

            // The wave completes only when every node settles.
            for joined in futures::future::join_all(handles).await {
                let (agent, outcome) = match joined {
                    Ok(settled) => settled,
                    Err(join_err) => {
                        // A panicked node is a failure, not a cycle abort.
                        warn!(error = %join_err, "node task panicked");
                        continue;
                    }
                };

                match &outcome {
                    NodeOutcome::Success => {
                        analysis.success_count += 1;
                        analysis.agents_run.push(agent);
                    }
                    NodeOutcome::Failure { .. } => {
                        analysis.failure_count += 1;
                        analysis.agents_run.push(agent);
                    }
                    NodeOutcome::Skipped { .. } => {
                        analysis.skipped_count += 1;
                    }
                }
                analysis.outcomes.push((agent, outcome));
            }
        }

        Ok(analysis)
    }
}

/// Run one node with its guard writes and timeout.
async fn run_node(
    ctx: Arc<RunnerContext>,
    runner: Arc<dyn AgentRunner>,
    stack_id: Uuid,
    agent: AgentType,
    reason: &str,
    node_timeout: Duration,
) -> NodeOutcome {
    // Guard in: visible as "executing" while the node runs.
    if let Err(err) = ctx
        .agent_states
        .set_run_state(
            stack_id,
            agent,
            AgentRunState::Executing,
            Some(reason.to_string()),
        )
        .await
    {
        return NodeOutcome::Failure {
            error: format!("guard write failed: {err}"),
        };
    }

    let outcome = match timeout(node_timeout, runner.run(stack_id, reason)).await {
        Ok(Ok(RunOutcome::Ran { .. })) => NodeOutcome::Success,
        Ok(Ok(RunOutcome::Skipped { reason })) => NodeOutcome::Skipped { reason },
        Ok(Err(err)) => NodeOutcome::Failure {
            error: err.to_string(),
        },
        Err(_) => NodeOutcome::Failure {
            error: crate::domain::errors::DomainError::Timeout(node_timeout.as_secs()).to_string(),
        },
    };

    // Guard out: back to idle (or error), current work cleared, stack
    // activity bumped. Guard failures must not mask the node outcome.
    let final_state = if outcome.is_failure() {
        AgentRunState::Error
    } else {
        AgentRunState::Idle
    };
    if let Err(err) = ctx
        .agent_states
        .set_run_state(stack_id, agent, final_state, None)
        .await
    {
        warn!(stack_id = %stack_id, agent = %agent, error = %err, "failed to reset run state");
    }
    if let Err(err) = ctx.stacks.touch_activity(stack_id, chrono::Utc::now()).await {
        warn!(stack_id = %stack_id, error = %err, "failed to bump stack activity");
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;
    use crate::domain::models::{GraphEdge, GraphNode};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::adapters::llm::{LlmGateway, MockChatProvider};
    use crate::adapters::sqlite::{
        create_seeded_test_pool, SqliteAgentStateRepository, SqliteArtifactRepository,
        SqliteMessageRepository, SqliteProjectIdeaRepository, SqliteStackRepository,
        SqliteTodoRepository, SqliteTraceRepository, SqliteUserMessageRepository,
    };
    use crate::domain::models::{AgentState, Stack};
    use crate::domain::ports::{AgentStateRepository, StackRepository};

    struct ScriptedRunner {
        agent: AgentType,
        outcome: &'static str,
        delay: Duration,
        invocations: AtomicUsize,
    }

    #[async_trait]
    impl AgentRunner for ScriptedRunner {
        fn agent_type(&self) -> AgentType {
            self.agent
        }

        async fn run(&self, _stack_id: Uuid, _reason: &str) -> DomainResult<RunOutcome> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.outcome {
                "ok" => Ok(RunOutcome::ran("work", "done")),
                "skip" => Ok(RunOutcome::skipped("nothing to do")),
                _ => Err(DomainError::ExecutionFailed("scripted failure".to_string())),
            }
        }
    }

    async fn test_context() -> (Arc<RunnerContext>, Uuid) {
        let pool = create_seeded_test_pool().await.unwrap();
        let stacks = Arc::new(SqliteStackRepository::new(pool.clone()));
        let agent_states = Arc::new(SqliteAgentStateRepository::new(pool.clone()));

        let stack = Stack::new("exec-test");
        stacks.create(&stack).await.unwrap();
        for agent in AgentType::ALL {
            agent_states
                .create(&AgentState::new(stack.id, agent))
                .await
                .unwrap();
        }

        let gateway = Arc::new(LlmGateway::new(
            vec![Arc::new(MockChatProvider::new())],
            vec!["mock".to_string()],
        ));

        let ctx = Arc::new(RunnerContext {
            stacks,
            agent_states,
            todos: Arc::new(SqliteTodoRepository::new(pool.clone())),
            projects: Arc::new(SqliteProjectIdeaRepository::new(pool.clone())),
            messages: Arc::new(SqliteMessageRepository::new(pool.clone())),
            user_messages: Arc::new(SqliteUserMessageRepository::new(pool.clone())),
            artifacts: Arc::new(SqliteArtifactRepository::new(pool.clone())),
            traces: Arc::new(SqliteTraceRepository::new(pool)),
            gateway,
            llm_timeout: Duration::from_secs(30),
            builder_llm_timeout: Duration::from_secs(60),
        });
        (ctx, stack.id)
    }

    fn graph_of(specs: &[(AgentType, &'static str)]) -> (AgentGraph, Vec<Arc<ScriptedRunner>>) {
        let nodes = specs
            .iter()
            .map(|(agent, _)| GraphNode {
                agent: *agent,
                priority: 5,
                reason: "test".to_string(),
            })
            .collect::<Vec<_>>();
        let runners = specs
            .iter()
            .map(|(agent, outcome)| {
                Arc::new(ScriptedRunner {
                    agent: *agent,
                    outcome,
                    delay: Duration::from_millis(5),
                    invocations: AtomicUsize::new(0),
                })
            })
            .collect::<Vec<_>>();
        let waves = AgentGraph::layer_waves(&nodes, &[]);
        (
            AgentGraph {
                nodes,
                edges: vec![],
                waves,
            },
            runners,
        )
    }

    fn registry(runners: &[Arc<ScriptedRunner>]) -> HashMap<AgentType, Arc<dyn AgentRunner>> {
        runners
            .iter()
            .map(|r| (r.agent, r.clone() as Arc<dyn AgentRunner>))
            .collect()
    }

    #[tokio::test]
    async fn test_every_node_settles_exactly_once() {
        let (ctx, stack_id) = test_context().await;
        let (graph, runners) = graph_of(&[
            (AgentType::Planner, "ok"),
            (AgentType::Builder, "fail"),
            (AgentType::Communicator, "skip"),
        ]);
        let executor = GraphExecutor::new(ctx, registry(&runners), ExecutorConfig::default());

        let analysis = executor.execute(stack_id, &graph).await.unwrap();
        assert_eq!(analysis.outcomes.len(), 3);
        assert_eq!(analysis.success_count, 1);
        assert_eq!(analysis.failure_count, 1);
        assert_eq!(analysis.skipped_count, 1);
        assert_eq!(analysis.parallel_executions, 3);
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let (ctx, stack_id) = test_context().await;
        let (graph, runners) = graph_of(&[
            (AgentType::Planner, "fail"),
            (AgentType::Communicator, "ok"),
        ]);
        let executor = GraphExecutor::new(ctx, registry(&runners), ExecutorConfig::default());

        let analysis = executor.execute(stack_id, &graph).await.unwrap();
        assert_eq!(analysis.success_count, 1);
        assert_eq!(analysis.failure_count, 1);
        assert_eq!(runners[1].invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_later_wave_runs_after_failure() {
        let (ctx, stack_id) = test_context().await;
        let nodes = vec![
            GraphNode {
                agent: AgentType::Builder,
                priority: 8,
                reason: "build".to_string(),
            },
            GraphNode {
                agent: AgentType::Reviewer,
                priority: 6,
                reason: "review".to_string(),
            },
        ];
        let edges = vec![GraphEdge {
            from: AgentType::Builder,
            to: AgentType::Reviewer,
        }];
        let waves = AgentGraph::layer_waves(&nodes, &edges);
        let graph = AgentGraph {
            nodes,
            edges,
            waves,
        };

        let builder = Arc::new(ScriptedRunner {
            agent: AgentType::Builder,
            outcome: "fail",
            delay: Duration::from_millis(5),
            invocations: AtomicUsize::new(0),
        });
        let reviewer = Arc::new(ScriptedRunner {
            agent: AgentType::Reviewer,
            outcome: "ok",
            delay: Duration::from_millis(5),
            invocations: AtomicUsize::new(0),
        });
        let executor = GraphExecutor::new(
            ctx,
            registry(&[builder.clone(), reviewer.clone()]),
            ExecutorConfig::default(),
        );

        let analysis = executor.execute(stack_id, &graph).await.unwrap();
        assert_eq!(analysis.waves, 2);
        assert_eq!(reviewer.invocations.load(Ordering::SeqCst), 1);
        assert_eq!(analysis.failure_count, 1);
        assert_eq!(analysis.success_count, 1);
    }

    #[tokio::test]
    async fn test_node_timeout_is_a_failure() {
        let (ctx, stack_id) = test_context().await;
        let slow = Arc::new(ScriptedRunner {
            agent: AgentType::Planner,
            outcome: "ok",
            delay: Duration::from_millis(200),
            invocations: AtomicUsize::new(0),
        });
        let nodes = vec![GraphNode {
            agent: AgentType::Planner,
            priority: 5,
            reason: "slow".to_string(),
        }];
        let waves = AgentGraph::layer_waves(&nodes, &[]);
        let graph = AgentGraph {
            nodes,
            edges: vec![],
            waves,
        };

        let executor = GraphExecutor::new(
            ctx.clone(),
            registry(&[slow]),
            ExecutorConfig {
                node_timeout: Duration::from_millis(20),
            },
        );

        let analysis = executor.execute(stack_id, &graph).await.unwrap();
        assert_eq!(analysis.failure_count, 1);
        match &analysis.outcomes[0].1 {
            NodeOutcome::Failure { error } => {
                assert!(error.to_lowercase().contains("timed out"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // Guard out ran: the agent is marked error, not stuck executing.
        let state = ctx
            .agent_states
            .get(stack_id, AgentType::Planner)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.run_state, AgentRunState::Error);
        assert!(state.current_work.is_none());
    }
}
