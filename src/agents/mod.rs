//! Agent runners: the four role bodies and their shared skeleton.

pub mod builder;
pub mod communicator;
pub mod planner;
pub mod reviewer;
pub mod runner;
pub mod schemas;

pub use builder::BuilderRunner;
pub use communicator::CommunicatorRunner;
pub use planner::PlannerRunner;
pub use reviewer::ReviewerRunner;
pub use runner::{AgentRunner, RunOutcome, RunnerContext};

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::models::AgentType;

/// Build the full role -> runner registry over one shared context.
pub fn build_runners(ctx: Arc<RunnerContext>) -> HashMap<AgentType, Arc<dyn AgentRunner>> {
    let mut runners: HashMap<AgentType, Arc<dyn AgentRunner>> = HashMap::new();
    runners.insert(
        AgentType::Planner,
        Arc::new(PlannerRunner::new(ctx.clone())),
    );
    runners.insert(
        AgentType::Builder,
        Arc::new(BuilderRunner::new(ctx.clone())),
    );
    runners.insert(
        AgentType::Communicator,
        Arc::new(CommunicatorRunner::new(ctx.clone())),
    );
    runners.insert(AgentType::Reviewer, Arc::new(ReviewerRunner::new(ctx)));
    runners
}
