//! Chat types shared by the LLM gateway and its providers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A provider-agnostic JSON schema for structured output. Each provider
/// adapter encodes it natively (tool use, function calling, or
/// `response_format.json_schema`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema {
    /// Identifier the provider sees as the tool/function/schema name.
    pub name: String,
    pub description: String,
    /// Draft-07-style object schema.
    pub schema: serde_json::Value,
}

impl JsonSchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }
}

/// Options for one gateway chat call.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Overrides the provider's default model.
    pub model: Option<String>,
    /// Provider-native schema-constrained output.
    pub structured: Option<JsonSchema>,
    /// Legacy: request a JSON object without a schema constraint.
    pub json_mode: bool,
    /// Overrides the gateway's default provider preference.
    pub provider_order: Option<Vec<String>>,
    /// Per-call deadline; providers must not outlive it.
    pub timeout: Duration,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
            model: None,
            structured: None,
            json_mode: false,
            provider_order: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ChatOptions {
    pub fn with_structured(mut self, schema: JsonSchema) -> Self {
        self.structured = Some(schema);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Result of one gateway chat call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Plain text, or JSON text in structured/json mode.
    pub content: String,
    pub usage: ChatUsage,
    pub model: String,
    pub provider: String,
}
