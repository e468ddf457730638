//! LLM adapters: provider clients and the fallback gateway.

pub mod anthropic;
pub mod gateway;
pub mod gemini;
pub mod mock;
pub mod openai;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use gateway::{LlmGateway, DEFAULT_PROVIDER_ORDER};
pub use gemini::{GeminiConfig, GeminiProvider};
pub use mock::MockChatProvider;
pub use openai::{OpenAiCompatConfig, OpenAiCompatProvider};
