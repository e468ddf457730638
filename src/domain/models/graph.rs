//! Agent execution graph.
//!
//! A cycle's graph has one node per agent with work and at most one edge
//! (builder before reviewer). Waves are the topological layering: wave 0
//! holds nodes with no in-edges among the selected nodes, and so on.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::domain::models::AgentType;

/// One agent node in the cycle graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub agent: AgentType,
    pub priority: u8,
    pub reason: String,
}

/// A dependency edge: `from` must settle before `to` dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: AgentType,
    pub to: AgentType,
}

/// Terminal state of one node after its wave settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NodeOutcome {
    Success,
    Failure { error: String },
    Skipped { reason: String },
}

impl NodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// Dependency-aware execution graph for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// Topological layering of `nodes` by agent.
    pub waves: Vec<Vec<AgentType>>,
}

impl AgentGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, agent: AgentType) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.agent == agent)
    }

    /// Compute waves by repeatedly peeling nodes whose in-edges are all
    /// satisfied. Edges referencing absent nodes are ignored.
    pub fn layer_waves(nodes: &[GraphNode], edges: &[GraphEdge]) -> Vec<Vec<AgentType>> {
        let selected: HashSet<AgentType> = nodes.iter().map(|n| n.agent).collect();
        let mut in_edges: HashMap<AgentType, Vec<AgentType>> = HashMap::new();
        for edge in edges {
            if selected.contains(&edge.from) && selected.contains(&edge.to) {
                in_edges.entry(edge.to).or_default().push(edge.from);
            }
        }

        let mut waves = Vec::new();
        let mut placed: HashSet<AgentType> = HashSet::new();
        let mut remaining: Vec<AgentType> = nodes.iter().map(|n| n.agent).collect();

        while !remaining.is_empty() {
            let ready: Vec<AgentType> = remaining
                .iter()
                .copied()
                .filter(|agent| {
                    in_edges
                        .get(agent)
                        .is_none_or(|deps| deps.iter().all(|d| placed.contains(d)))
                })
                .collect();

            // The only edge shape we build is builder -> reviewer, so the
            // graph is always acyclic; the guard protects against a
            // malformed edge set rather than a real cycle.
            if ready.is_empty() {
                waves.push(remaining.clone());
                break;
            }

            for agent in &ready {
                placed.insert(*agent);
            }
            remaining.retain(|a| !placed.contains(a));
            waves.push(ready);
        }

        waves
    }
}

/// Summary of one graph execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionAnalysis {
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    pub agents_run: Vec<AgentType>,
    pub waves: usize,
    /// Largest number of agents dispatched concurrently in one wave.
    pub parallel_executions: usize,
    /// Per-node terminal states, in dispatch order.
    pub outcomes: Vec<(AgentType, NodeOutcome)>,
}

impl ExecutionAnalysis {
    pub fn ran(&self, agent: AgentType) -> bool {
        self.agents_run.contains(&agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(agent: AgentType) -> GraphNode {
        GraphNode {
            agent,
            priority: 5,
            reason: "test".to_string(),
        }
    }

    #[test]
    fn test_single_wave_without_edges() {
        let nodes = vec![
            node(AgentType::Planner),
            node(AgentType::Communicator),
            node(AgentType::Reviewer),
        ];
        let waves = AgentGraph::layer_waves(&nodes, &[]);
        assert_eq!(waves.len(), 1);
        assert_eq!(waves[0].len(), 3);
    }

    #[test]
    fn test_builder_before_reviewer() {
        let nodes = vec![
            node(AgentType::Planner),
            node(AgentType::Builder),
            node(AgentType::Reviewer),
        ];
        let edges = vec![GraphEdge {
            from: AgentType::Builder,
            to: AgentType::Reviewer,
        }];
        let waves = AgentGraph::layer_waves(&nodes, &edges);
        assert_eq!(waves.len(), 2);
        assert!(waves[0].contains(&AgentType::Planner));
        assert!(waves[0].contains(&AgentType::Builder));
        assert_eq!(waves[1], vec![AgentType::Reviewer]);
    }

    #[test]
    fn test_edge_to_absent_node_ignored() {
        let nodes = vec![node(AgentType::Reviewer)];
        let edges = vec![GraphEdge {
            from: AgentType::Builder,
            to: AgentType::Reviewer,
        }];
        let waves = AgentGraph::layer_waves(&nodes, &edges);
        assert_eq!(waves, vec![vec![AgentType::Reviewer]]);
    }

    #[test]
    fn test_empty_graph() {
        let graph = AgentGraph::default();
        assert!(graph.is_empty());
        assert!(AgentGraph::layer_waves(&[], &[]).is_empty());
    }
}
