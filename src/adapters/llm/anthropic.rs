//! Anthropic Messages API chat provider.
//!
//! Structured output is encoded as a forced tool call: the schema becomes
//! a single tool's `input_schema` and `tool_choice` pins the model to it.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ChatMessage, ChatOptions, ChatResponse, ChatRole, ChatUsage};
use crate::domain::ports::ChatProvider;

/// Configuration for the Anthropic provider.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key (read from ANTHROPIC_API_KEY env if not set).
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_model: String,
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            default_model: "claude-sonnet-4-20250514".to_string(),
            api_version: "2023-06-01".to_string(),
        }
    }
}

impl AnthropicConfig {
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ToolSpec {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice {
    #[serde(rename = "type")]
    choice_type: &'static str,
    name: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { input: serde_json::Value },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    usage: Usage,
}

/// Anthropic chat provider.
pub struct AnthropicProvider {
    config: AnthropicConfig,
    api_key: String,
    client: Client,
}

impl AnthropicProvider {
    /// Build the provider if an API key is available.
    pub fn from_config(config: AnthropicConfig) -> Option<Self> {
        let api_key = config.get_api_key()?;
        Some(Self {
            config,
            api_key,
            client: Client::new(),
        })
    }

    fn build_request(&self, messages: &[ChatMessage], options: &ChatOptions) -> MessagesRequest {
        let system = messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.clone())
            .reduce(|a, b| format!("{a}\n\n{b}"));

        let api_messages = messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| ApiMessage {
                role: match m.role {
                    ChatRole::Assistant => "assistant",
                    _ => "user",
                },
                content: m.content.clone(),
            })
            .collect();

        let (tools, tool_choice) = match &options.structured {
            Some(schema) => (
                Some(vec![ToolSpec {
                    name: schema.name.clone(),
                    description: schema.description.clone(),
                    input_schema: schema.schema.clone(),
                }]),
                Some(ToolChoice {
                    choice_type: "tool",
                    name: schema.name.clone(),
                }),
            ),
            None => (None, None),
        };

        MessagesRequest {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.config.default_model.clone()),
            max_tokens: options.max_tokens,
            system,
            messages: api_messages,
            temperature: options.temperature,
            tools,
            tool_choice,
        }
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> DomainResult<ChatResponse> {
        let request = self.build_request(messages, options);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.config.api_version)
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::LlmProvider {
                provider: "anthropic".to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::LlmProvider {
                provider: "anthropic".to_string(),
                message: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: MessagesResponse =
            response.json().await.map_err(|e| DomainError::LlmProvider {
                provider: "anthropic".to_string(),
                message: format!("bad response body: {e}"),
            })?;

        let content = if options.structured.is_some() {
            parsed
                .content
                .iter()
                .find_map(|block| match block {
                    ContentBlock::ToolUse { input } => Some(input.to_string()),
                    _ => None,
                })
                .ok_or_else(|| DomainError::LlmProvider {
                    provider: "anthropic".to_string(),
                    message: "structured response missing tool_use block".to_string(),
                })?
        } else {
            parsed
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("")
        };

        Ok(ChatResponse {
            content,
            usage: ChatUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
            model: parsed.model,
            provider: "anthropic".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::JsonSchema;

    fn provider_for(url: String) -> AnthropicProvider {
        AnthropicProvider::from_config(
            AnthropicConfig::default()
                .with_api_key("test-key")
                .with_base_url(url),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_key_disables_provider() {
        temp_env::with_var("ANTHROPIC_API_KEY", None::<&str>, || {
            assert!(AnthropicProvider::from_config(AnthropicConfig::default()).is_none());
        });
    }

    #[tokio::test]
    async fn test_structured_chat_extracts_tool_input() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_body(
                r#"{
                    "content": [{"type": "tool_use", "id": "t1", "name": "plan", "input": {"thinking": "ok", "actions": []}}],
                    "model": "claude-sonnet-4-20250514",
                    "usage": {"input_tokens": 10, "output_tokens": 5}
                }"#,
            )
            .create_async()
            .await;

        let provider = provider_for(server.url());
        let options = ChatOptions::default().with_structured(JsonSchema::new(
            "plan",
            "planner output",
            serde_json::json!({"type": "object"}),
        ));
        let response = provider
            .chat(&[ChatMessage::user("plan something")], &options)
            .await
            .unwrap();

        mock.assert_async().await;
        let parsed: serde_json::Value = serde_json::from_str(&response.content).unwrap();
        assert_eq!(parsed["thinking"], "ok");
        assert_eq!(response.provider, "anthropic");
    }

    #[tokio::test]
    async fn test_http_error_surfaces_as_provider_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body("overloaded")
            .create_async()
            .await;

        let provider = provider_for(server.url());
        let err = provider
            .chat(&[ChatMessage::user("hi")], &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::LlmProvider { .. }));
    }
}
