//! Reviewer agent runner.
//!
//! Audits the latest artifact once per version and hands its
//! recommendations to the planner through planner memory.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::agents::runner::{
    parse_structured, truncate_chars, AgentRunner, RunOutcome, RunnerContext,
};
use crate::agents::schemas::reviewer_schema;
use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentMemory, AgentType, ChatMessage};
use crate::domain::ports::{AgentStateRepository, ArtifactRepository, ProjectIdeaRepository};

/// How many recommendations the reviewer keeps in its own memory.
const KEPT_RECOMMENDATIONS: usize = 10;

/// Artifact budget for the review prompt.
const REVIEW_CONTEXT_MAX_CHARS: usize = 50 * 1024;

const VALID_SEVERITIES: [&str; 3] = ["critical", "major", "minor"];

/// Structured reviewer reply.
#[derive(Debug, Deserialize)]
pub struct ReviewerOutput {
    pub thinking: String,
    pub results: ReviewerResults,
}

#[derive(Debug, Deserialize)]
pub struct ReviewerResults {
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewIssue {
    pub severity: String,
    pub description: String,
}

pub struct ReviewerRunner {
    ctx: Arc<RunnerContext>,
}

impl ReviewerRunner {
    pub fn new(ctx: Arc<RunnerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl AgentRunner for ReviewerRunner {
    fn agent_type(&self) -> AgentType {
        AgentType::Reviewer
    }

    async fn run(&self, stack_id: Uuid, reason: &str) -> DomainResult<RunOutcome> {
        let Some(artifact) = self.ctx.artifacts.latest(stack_id).await? else {
            return Ok(RunOutcome::skipped("no artifact to review"));
        };

        let Some(mut state) = self
            .ctx
            .agent_states
            .get(stack_id, AgentType::Reviewer)
            .await?
        else {
            return Ok(RunOutcome::skipped("reviewer state missing"));
        };

        // Review each version at most once, and never an artifact older
        // than the last review.
        if let AgentMemory::Reviewer(memory) = &state.memory {
            if let Some(last_reviewed) = memory.last_reviewed_version {
                if artifact.version <= last_reviewed {
                    return Ok(RunOutcome::skipped(format!(
                        "version {} already reviewed",
                        artifact.version
                    )));
                }
            }
            if let Some(last_review) = memory.last_review_time {
                if artifact.created_at <= last_review {
                    return Ok(RunOutcome::skipped("no artifact newer than last review"));
                }
            }
        }

        let project = self.ctx.projects.get_for_stack(stack_id).await?;
        let mut prompt = format!(
            "Scheduled because: {}\n\nArtifact version {}:\n{}\n",
            reason,
            artifact.version,
            truncate_chars(&artifact.content, REVIEW_CONTEXT_MAX_CHARS)
        );
        if let Some(idea) = &project {
            prompt.push_str(&format!("\nProject: {} - {}\n", idea.title, idea.description));
        }

        let messages = vec![
            ChatMessage::system(
                "You are the reviewer of a hackathon team. Audit the HTML artifact for \
                 broken markup, usability problems, and gaps against the project idea. \
                 Be specific; recommendations become the planner's next todos.",
            ),
            ChatMessage::user(prompt),
        ];
        let options = self
            .ctx
            .chat_options_for(AgentType::Reviewer)
            .with_structured(reviewer_schema());

        let response = self.ctx.gateway.chat(&messages, &options).await?;
        let output: ReviewerOutput = parse_structured(&response.content)?;

        // Drop issues with out-of-contract severities instead of failing.
        let issues: Vec<&ReviewIssue> = output
            .results
            .issues
            .iter()
            .filter(|issue| {
                let ok = VALID_SEVERITIES.contains(&issue.severity.as_str());
                if !ok {
                    warn!(stack_id = %stack_id, severity = %issue.severity, "unknown issue severity dropped");
                }
                ok
            })
            .collect();

        let now = Utc::now();
        if let AgentMemory::Reviewer(memory) = &mut state.memory {
            memory.last_review_time = Some(now);
            memory.last_reviewed_version = Some(artifact.version);
            memory.last_review_issues_count = Some(issues.len() as u32);
            memory.recommendations = output
                .results
                .recommendations
                .iter()
                .take(KEPT_RECOMMENDATIONS)
                .cloned()
                .collect();
        }
        state.push_thought(&output.thinking);
        self.ctx.agent_states.update(&state).await?;

        // Hand the recommendations to the planner for its next cycle.
        if let Some(mut planner_state) = self
            .ctx
            .agent_states
            .get(stack_id, AgentType::Planner)
            .await?
        {
            if let AgentMemory::Planner(memory) = &mut planner_state.memory {
                memory.reviewer_recommendations = output.results.recommendations.clone();
                memory.recommendations_timestamp = Some(now);
                memory.recommendations_type = Some("hackathon_audit".to_string());
            }
            self.ctx.agent_states.update(&planner_state).await?;
        }

        let action = format!("review artifact v{}", artifact.version);
        let result = format!(
            "{} recommendation(s), {} issue(s)",
            output.results.recommendations.len(),
            issues.len()
        );
        self.ctx
            .trace(stack_id, AgentType::Reviewer, &output.thinking, &action, &result)
            .await?;

        Ok(RunOutcome::ran(action, result))
    }
}
