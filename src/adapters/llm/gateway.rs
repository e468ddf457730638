//! Provider-agnostic LLM gateway with ordered fallback.
//!
//! One attempt per provider per call; retry at a coarser granularity is
//! the scheduler's job. A provider with no API key is simply absent from
//! the registry, so it can never be attempted.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ChatMessage, ChatOptions, ChatResponse};
use crate::domain::ports::ChatProvider;

use super::anthropic::{AnthropicConfig, AnthropicProvider};
use super::gemini::{GeminiConfig, GeminiProvider};
use super::openai::{OpenAiCompatConfig, OpenAiCompatProvider};

/// Default provider preference, cheapest-and-fastest first.
pub const DEFAULT_PROVIDER_ORDER: [&str; 4] = ["groq", "openai", "gemini", "anthropic"];

/// Fallback-capable chat facade over all configured providers.
pub struct LlmGateway {
    providers: HashMap<String, Arc<dyn ChatProvider>>,
    default_order: Vec<String>,
}

impl LlmGateway {
    /// Build from explicit providers and an order. Names not present in
    /// `providers` are skipped at call time.
    pub fn new(providers: Vec<Arc<dyn ChatProvider>>, default_order: Vec<String>) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();
        Self {
            providers,
            default_order,
        }
    }

    /// Build from the environment: each provider joins the registry only
    /// when its API key is present.
    pub fn from_env(default_order: Vec<String>) -> Self {
        let mut providers: Vec<Arc<dyn ChatProvider>> = Vec::new();
        if let Some(p) = OpenAiCompatProvider::from_config(OpenAiCompatConfig::groq()) {
            providers.push(Arc::new(p));
        }
        if let Some(p) = OpenAiCompatProvider::from_config(OpenAiCompatConfig::openai()) {
            providers.push(Arc::new(p));
        }
        if let Some(p) = GeminiProvider::from_config(GeminiConfig::default()) {
            providers.push(Arc::new(p));
        }
        if let Some(p) = AnthropicProvider::from_config(AnthropicConfig::default()) {
            providers.push(Arc::new(p));
        }
        Self::new(providers, default_order)
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Send one chat request, falling through providers in order. In
    /// structured mode the returned content is JSON text matching the
    /// requested schema (the caller still validates by parsing).
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> DomainResult<ChatResponse> {
        let order = options
            .provider_order
            .clone()
            .unwrap_or_else(|| self.default_order.clone());

        let mut last_error = "no providers configured".to_string();

        for name in &order {
            let Some(provider) = self.providers.get(name) else {
                continue;
            };

            debug!(provider = %name, "attempting chat call");
            match provider.chat(messages, options).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    warn!(provider = %name, error = %err, "provider failed, falling through");
                    last_error = err.to_string();
                }
            }
        }

        Err(DomainError::LlmUnavailable { last_error })
    }
}
