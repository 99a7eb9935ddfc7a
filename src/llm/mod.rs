//! LLM provider abstraction: a uniform `chat` interface across vendors with
//! retries, cost accounting, and purpose-based selection.
//!
//! ## Example
//!
//! ```rust,ignore
//! use jobhunter_core::llm::{AnthropicClient, ClientConfig, ChatMessage, ProviderClient};
//!
//! let client = AnthropicClient::new(ClientConfig::new("api-key", "claude-3-5-haiku-20241022"));
//! let response = client.chat(&[ChatMessage::user("score this job")], 0.0, 1024).await?;
//! ```

mod client;
mod registry;
mod types;

pub use client::{parse_structured_response, AnthropicClient, ClientConfig, OpenAIClient, ProviderClient};
#[cfg(feature = "gemini")]
pub use client::GoogleClient;
pub use registry::{ProviderRegistry, ProviderSelection, Purpose};
pub use types::{
    known_models, ChatMessage, ChatResponse, ChatRole, ModelSpec, Provider, ProviderStats, TokenUsage,
};
