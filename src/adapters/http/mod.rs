//! HTTP adapters: the admin/observability/chat API.

pub mod server;

pub use server::{build_router, serve, AppState, HttpConfig};
