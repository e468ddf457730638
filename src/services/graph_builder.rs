//! Graph builder: turns a `WorkStatus` into an executable agent graph.

use crate::domain::models::{AgentGraph, AgentType, GraphEdge, GraphNode, WorkStatus};

/// Build the cycle graph: one node per agent with work, edges from each
/// node's declared dependencies, waves from topological layering.
pub fn build(status: &WorkStatus) -> AgentGraph {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    for agent in AgentType::ALL {
        let work = status.get(agent);
        if !work.has_work {
            continue;
        }
        nodes.push(GraphNode {
            agent,
            priority: work.priority,
            reason: work.reason.clone(),
        });
        for dep in &work.dependencies {
            edges.push(GraphEdge {
                from: *dep,
                to: agent,
            });
        }
    }

    // Keep only edges whose endpoints were both selected.
    let selected: Vec<AgentType> = nodes.iter().map(|n| n.agent).collect();
    edges.retain(|e| selected.contains(&e.from) && selected.contains(&e.to));

    let waves = AgentGraph::layer_waves(&nodes, &edges);
    AgentGraph {
        nodes,
        edges,
        waves,
    }
}
