//! Global scheduler: the only process-wide singleton.
//!
//! Every tick it fans out over all `running` stacks and spawns an
//! orchestrator chain for each whose lease is free (or stale). Cycles for
//! different stacks run concurrently; the lease keeps each stack
//! single-flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::ExecutionState;
use crate::domain::ports::StackRepository;
use crate::services::orchestrator::Orchestrator;

/// Configuration for the global scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between fan-out passes.
    pub tick_interval: Duration,
    /// Hard wall-clock bound on a spawned cycle chain. Per-node timeouts
    /// only bound one wave; a two-wave graph or a run of continues could
    /// otherwise outlive the budget and be left to the stale-lease reap.
    pub cycle_deadline: Duration,
    /// How long shutdown waits for in-flight cycles.
    pub drain_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            cycle_deadline: Duration::from_secs(60),
            drain_timeout: Duration::from_secs(60),
        }
    }
}

pub struct Scheduler {
    stacks: Arc<dyn StackRepository>,
    orchestrator: Arc<Orchestrator>,
    config: SchedulerConfig,
    running: Arc<AtomicBool>,
    cycles: Arc<Mutex<JoinSet<()>>>,
}

impl Scheduler {
    pub fn new(
        stacks: Arc<dyn StackRepository>,
        orchestrator: Arc<Orchestrator>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            stacks,
            orchestrator,
            config,
            running: Arc::new(AtomicBool::new(false)),
            cycles: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// One fan-out pass: spawn a cycle chain for every running stack.
    /// Lease acquisition happens inside each spawned task, so a stack
    /// whose previous cycle is still live is left alone.
    pub async fn tick(&self) -> DomainResult<usize> {
        let stacks = self
            .stacks
            .list_by_execution_state(ExecutionState::Running)
            .await?;

        let mut cycles = self.cycles.lock().await;
        // Reap finished cycle tasks.
        while cycles.try_join_next().is_some() {}

        let mut scheduled = 0;
        for stack in stacks {
            let orchestrator = self.orchestrator.clone();
            let stack_id = stack.id;
            let deadline = self.config.cycle_deadline;
            scheduled += 1;
            cycles.spawn(async move {
                match timeout(deadline, orchestrator.try_run_chain(stack_id)).await {
                    Ok(Ok(Some(decision))) => {
                        debug!(stack_id = %stack_id, decision = decision.kind(), "cycle chain finished");
                    }
                    Ok(Ok(None)) => {
                        debug!(stack_id = %stack_id, "lease busy, skipped");
                    }
                    Ok(Err(err)) => {
                        // One stack's failure never degrades the others.
                        warn!(stack_id = %stack_id, error = %err, "cycle chain failed");
                    }
                    Err(_) => {
                        warn!(
                            stack_id = %stack_id,
                            deadline_secs = deadline.as_secs(),
                            "cycle deadline exceeded, chain cancelled"
                        );
                        orchestrator.fail_after_deadline(stack_id, deadline).await;
                    }
                }
            });
        }

        Ok(scheduled)
    }

    /// Await every spawned cycle. Used by shutdown and tests.
    pub async fn drain(&self) {
        let mut cycles = self.cycles.lock().await;
        while cycles.join_next().await.is_some() {}
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the periodic tick loop.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.config.tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(
                interval_secs = this.config.tick_interval.as_secs(),
                "scheduler started"
            );

            while this.running.load(Ordering::SeqCst) {
                interval.tick().await;
                if !this.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(err) = this.tick().await {
                    warn!(error = %err, "scheduler tick failed");
                }
            }
            info!("scheduler loop exited");
        })
    }

    /// Stop ticking and drain outstanding cycles up to the drain budget.
    pub async fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("scheduler draining outstanding cycles");
        if tokio::time::timeout(self.config.drain_timeout, self.drain())
            .await
            .is_err()
        {
            warn!(
                budget_secs = self.config.drain_timeout.as_secs(),
                "drain budget exceeded, abandoning remaining cycles"
            );
        }
    }
}
