//! OpenAI-compatible chat-completions provider.
//!
//! Used for both OpenAI and Groq (same wire protocol, different base URL
//! and key). Structured output uses `response_format.json_schema`; legacy
//! json mode uses `response_format.json_object`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ChatMessage, ChatOptions, ChatResponse, ChatRole, ChatUsage};
use crate::domain::ports::ChatProvider;

/// Configuration for an OpenAI-compatible provider.
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    /// Stable provider name ("openai" or "groq").
    pub provider: &'static str,
    /// Env var holding the API key.
    pub api_key_env: &'static str,
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_model: String,
}

impl OpenAiCompatConfig {
    pub fn openai() -> Self {
        Self {
            provider: "openai",
            api_key_env: "OPENAI_API_KEY",
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            default_model: "gpt-4o-mini".to_string(),
        }
    }

    pub fn groq() -> Self {
        Self {
            provider: "groq",
            api_key_env: "GROQ_API_KEY",
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            default_model: "llama-3.3-70b-versatile".to_string(),
        }
    }

    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(self.api_key_env).ok())
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: String,
    schema: serde_json::Value,
    strict: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ResponseFormat {
    #[serde(rename = "json_schema")]
    JsonSchema { json_schema: JsonSchemaFormat },
    #[serde(rename = "json_object")]
    JsonObject,
}

#[derive(Debug, Serialize)]
struct CompletionsRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    choices: Vec<Choice>,
    model: String,
    #[serde(default)]
    usage: Usage,
}

/// OpenAI-compatible chat provider.
pub struct OpenAiCompatProvider {
    config: OpenAiCompatConfig,
    api_key: String,
    client: Client,
}

impl OpenAiCompatProvider {
    /// Build the provider if an API key is available.
    pub fn from_config(config: OpenAiCompatConfig) -> Option<Self> {
        let api_key = config.get_api_key()?;
        Some(Self {
            config,
            api_key,
            client: Client::new(),
        })
    }

    fn build_request(&self, messages: &[ChatMessage], options: &ChatOptions) -> CompletionsRequest {
        let api_messages = messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    ChatRole::System => "system",
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: m.content.clone(),
            })
            .collect();

        let response_format = match (&options.structured, options.json_mode) {
            (Some(schema), _) => Some(ResponseFormat::JsonSchema {
                json_schema: JsonSchemaFormat {
                    name: schema.name.clone(),
                    schema: schema.schema.clone(),
                    strict: true,
                },
            }),
            (None, true) => Some(ResponseFormat::JsonObject),
            (None, false) => None,
        };

        CompletionsRequest {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.config.default_model.clone()),
            messages: api_messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &'static str {
        self.config.provider
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> DomainResult<ChatResponse> {
        let request = self.build_request(messages, options);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.api_key)
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::LlmProvider {
                provider: self.config.provider.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::LlmProvider {
                provider: self.config.provider.to_string(),
                message: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: CompletionsResponse =
            response.json().await.map_err(|e| DomainError::LlmProvider {
                provider: self.config.provider.to_string(),
                message: format!("bad response body: {e}"),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| DomainError::LlmProvider {
                provider: self.config.provider.to_string(),
                message: "response had no choices".to_string(),
            })?;

        Ok(ChatResponse {
            content,
            usage: ChatUsage {
                input_tokens: parsed.usage.prompt_tokens,
                output_tokens: parsed.usage.completion_tokens,
            },
            model: parsed.model,
            provider: self.config.provider.to_string(),
        })
    }
}
