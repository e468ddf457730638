//! Adapters: infrastructure implementations of the domain ports.

pub mod http;
pub mod llm;
pub mod sqlite;
