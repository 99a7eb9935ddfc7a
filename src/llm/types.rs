//! LLM types for requests, responses, and model pricing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// LLM provider backing a [`super::ProviderClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Provider {
    Anthropic,
    OpenAI,
    OpenRouter,
    #[cfg(feature = "gemini")]
    Google,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAI => write!(f, "openai"),
            Self::OpenRouter => write!(f, "openrouter"),
            #[cfg(feature = "gemini")]
            Self::Google => write!(f, "google"),
        }
    }
}

impl Provider {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "anthropic" => Self::Anthropic,
            "openai" => Self::OpenAI,
            "openrouter" => Self::OpenRouter,
            #[cfg(feature = "gemini")]
            "google" | "gemini" => Self::Google,
            _ => return None,
        })
    }
}

/// Pricing and identity for a single model, used by [`ModelSpec::calculate_cost`]
/// (the `CostFor` operation in the provider contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    pub provider: Provider,
    /// Input cost per million tokens (USD).
    pub input_cost_per_m: f64,
    /// Output cost per million tokens (USD).
    pub output_cost_per_m: f64,
}

impl ModelSpec {
    pub fn calculate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_m;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_m;
        input_cost + output_cost
    }
}

/// Known models and their per-million-token pricing. New models can be added
/// without touching client code since pricing is looked up by id.
pub fn known_models() -> Vec<ModelSpec> {
    let mut models = vec![
        ModelSpec {
            id: "claude-opus-4-20250514".to_string(),
            provider: Provider::Anthropic,
            input_cost_per_m: 15.0,
            output_cost_per_m: 75.0,
        },
        ModelSpec {
            id: "claude-sonnet-4-20250514".to_string(),
            provider: Provider::Anthropic,
            input_cost_per_m: 3.0,
            output_cost_per_m: 15.0,
        },
        ModelSpec {
            id: "claude-3-5-haiku-20241022".to_string(),
            provider: Provider::Anthropic,
            input_cost_per_m: 0.8,
            output_cost_per_m: 4.0,
        },
        ModelSpec {
            id: "gpt-4o".to_string(),
            provider: Provider::OpenAI,
            input_cost_per_m: 2.5,
            output_cost_per_m: 10.0,
        },
        ModelSpec {
            id: "gpt-4o-mini".to_string(),
            provider: Provider::OpenAI,
            input_cost_per_m: 0.15,
            output_cost_per_m: 0.60,
        },
    ];
    #[cfg(feature = "gemini")]
    models.push(ModelSpec {
        id: "gemini-1.5-flash".to_string(),
        provider: Provider::Google,
        input_cost_per_m: 0.075,
        output_cost_per_m: 0.30,
    });
    models
}

fn model_spec_for(model: &str, provider: Provider) -> ModelSpec {
    known_models()
        .into_iter()
        .find(|m| m.id == model)
        .unwrap_or(ModelSpec {
            id: model.to_string(),
            provider,
            input_cost_per_m: 3.0,
            output_cost_per_m: 15.0,
        })
}

/// Role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A message in a conversation passed to [`super::ProviderClient::chat`].
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

/// Token usage for a single [`ChatResponse`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Response to a `chat` call: content, token usage, and its realized cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub cost_usd: f64,
    pub model: String,
    pub timestamp: DateTime<Utc>,
}

/// Running totals an implementation keeps per-instance, exposed via
/// `ProviderClient::stats` / `reset_stats`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProviderStats {
    pub total_cost_usd: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_calls: u64,
}

pub(super) use model_spec_for as lookup_model_spec;
