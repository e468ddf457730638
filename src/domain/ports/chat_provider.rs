//! Chat provider port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ChatMessage, ChatOptions, ChatResponse};

/// One LLM provider behind the gateway. Implementations make a single
/// attempt per call; fallback and retry discipline live in the gateway
/// and the scheduler respectively.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Stable provider name used in configs and `provider_order`.
    fn name(&self) -> &'static str;

    /// Send one chat request. In structured mode the returned `content`
    /// is JSON text the caller parses against the requested schema.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> DomainResult<ChatResponse>;
}
