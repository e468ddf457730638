//! Stackhive - autonomous multi-agent hackathon simulator.
//!
//! Many independent "stacks" (teams of four cooperating agents: planner,
//! builder, communicator, reviewer) each build a single HTML artifact.
//! The core is a per-stack control loop: detect which agents have work,
//! compose them into a dependency-aware graph, run eligible agents in
//! parallel against the SQLite state store, then derive an adaptive
//! pause/continue decision. A global scheduler fans out over all running
//! stacks, enforces single-flight per stack, and recovers stuck cycles.

pub mod adapters;
pub mod agents;
pub mod cli;
pub mod domain;
pub mod services;
