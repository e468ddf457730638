//! Google Gemini generateContent provider.
//!
//! Structured output is encoded as function calling with the calling mode
//! pinned to ANY, so the model must answer through the declared function.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ChatMessage, ChatOptions, ChatResponse, ChatRole, ChatUsage};
use crate::domain::ports::ChatProvider;

/// Configuration for the Gemini provider.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key (read from GEMINI_API_KEY env if not set).
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            default_model: "gemini-2.0-flash".to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
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

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "functionCall", skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct Tool {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionCallingConfig {
    mode: &'static str,
    #[serde(rename = "allowedFunctionNames")]
    allowed_function_names: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ToolConfig {
    #[serde(rename = "functionCallingConfig")]
    function_calling_config: FunctionCallingConfig,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(rename = "toolConfig", skip_serializing_if = "Option::is_none")]
    tool_config: Option<ToolConfig>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: u64,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata", default)]
    usage_metadata: UsageMetadata,
}

/// Gemini chat provider.
pub struct GeminiProvider {
    config: GeminiConfig,
    api_key: String,
    client: Client,
}

impl GeminiProvider {
    /// Build the provider if an API key is available.
    pub fn from_config(config: GeminiConfig) -> Option<Self> {
        let api_key = config.get_api_key()?;
        Some(Self {
            config,
            api_key,
            client: Client::new(),
        })
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> GenerateContentRequest {
        let system_instruction = messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.clone())
            .reduce(|a, b| format!("{a}\n\n{b}"))
            .map(|text| Content {
                role: None,
                parts: vec![Part {
                    text: Some(text),
                    function_call: None,
                }],
            });

        let contents = messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| Content {
                role: Some(
                    match m.role {
                        ChatRole::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: Some(m.content.clone()),
                    function_call: None,
                }],
            })
            .collect();

        let (tools, tool_config) = match &options.structured {
            Some(schema) => (
                Some(vec![Tool {
                    function_declarations: vec![FunctionDeclaration {
                        name: schema.name.clone(),
                        description: schema.description.clone(),
                        parameters: schema.schema.clone(),
                    }],
                }]),
                Some(ToolConfig {
                    function_calling_config: FunctionCallingConfig {
                        mode: "ANY",
                        allowed_function_names: vec![schema.name.clone()],
                    },
                }),
            ),
            None => (None, None),
        };

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
                response_mime_type: (options.json_mode && options.structured.is_none())
                    .then_some("application/json"),
            },
            tools,
            tool_config,
        }
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> DomainResult<ChatResponse> {
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());
        let request = self.build_request(messages, options);

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.config.base_url, model
            ))
            .query(&[("key", &self.api_key)])
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::LlmProvider {
                provider: "gemini".to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::LlmProvider {
                provider: "gemini".to_string(),
                message: format!("HTTP {status}: {body}"),
            });
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| DomainError::LlmProvider {
                provider: "gemini".to_string(),
                message: format!("bad response body: {e}"),
            })?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::LlmProvider {
                provider: "gemini".to_string(),
                message: "response had no candidates".to_string(),
            })?;

        let content = if options.structured.is_some() {
            candidate
                .content
                .parts
                .iter()
                .find_map(|p| p.function_call.as_ref().map(|fc| fc.args.to_string()))
                .ok_or_else(|| DomainError::LlmProvider {
                    provider: "gemini".to_string(),
                    message: "structured response missing functionCall part".to_string(),
                })?
        } else {
            candidate
                .content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("")
        };

        Ok(ChatResponse {
            content,
            usage: ChatUsage {
                input_tokens: parsed.usage_metadata.prompt_token_count,
                output_tokens: parsed.usage_metadata.candidates_token_count,
            },
            model,
            provider: "gemini".to_string(),
        })
    }
}
