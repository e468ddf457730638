//! Mock chat provider for tests.
//!
//! Responses can be scripted globally or per schema name, so a scenario
//! can hand each agent role its own structured reply.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ChatMessage, ChatOptions, ChatResponse, ChatUsage};
use crate::domain::ports::ChatProvider;

/// One recorded call, for assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    /// Name of the requested structured schema, if any.
    pub schema_name: Option<String>,
}

#[derive(Default)]
struct MockState {
    /// Responses keyed by structured schema name.
    by_schema: HashMap<String, VecDeque<String>>,
    /// Fallback responses consumed in order, then `default_response`.
    queue: VecDeque<String>,
    calls: Vec<RecordedCall>,
    /// Artificial latency applied to every call.
    delay: Duration,
}

/// Scripted chat provider.
pub struct MockChatProvider {
    name: &'static str,
    default_response: String,
    fail_with: Option<String>,
    state: Mutex<MockState>,
}

impl MockChatProvider {
    pub fn new() -> Self {
        Self::named("mock")
    }

    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            default_response: "{}".to_string(),
            fail_with: None,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Set the fallback response returned when nothing is scripted.
    pub fn with_response(mut self, content: impl Into<String>) -> Self {
        self.default_response = content.into();
        self
    }

    /// Make every call fail with a provider error.
    pub fn always_fail(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    /// Queue a response consumed by the next call requesting the given
    /// structured schema.
    pub fn push_for_schema(&self, schema_name: impl Into<String>, content: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state
            .by_schema
            .entry(schema_name.into())
            .or_default()
            .push_back(content.into());
    }

    /// Queue a response consumed by the next call regardless of schema.
    pub fn push_response(&self, content: impl Into<String>) {
        self.state.lock().unwrap().queue.push_back(content.into());
    }

    /// Make every subsequent call take this long, to exercise timeout
    /// and deadline paths.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that requested a given schema.
    pub fn calls_for_schema(&self, schema_name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.schema_name.as_deref() == Some(schema_name))
            .count()
    }
}

impl Default for MockChatProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> DomainResult<ChatResponse> {
        let schema_name = options.structured.as_ref().map(|s| s.name.clone());

        // Resolve everything under the lock, then release it before any
        // simulated latency.
        let (content, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(RecordedCall {
                messages: messages.to_vec(),
                schema_name: schema_name.clone(),
            });

            if let Some(message) = &self.fail_with {
                return Err(DomainError::LlmProvider {
                    provider: self.name.to_string(),
                    message: message.clone(),
                });
            }

            let content = schema_name
                .as_ref()
                .and_then(|name| state.by_schema.get_mut(name))
                .and_then(VecDeque::pop_front)
                .or_else(|| state.queue.pop_front())
                .unwrap_or_else(|| self.default_response.clone());
            (content, state.delay)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Ok(ChatResponse {
            content,
            usage: ChatUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            provider: self.name.to_string(),
        })
    }
}
