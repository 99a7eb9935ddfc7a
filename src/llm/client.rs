//! `ProviderClient`: the uniform LLM call interface used by the Scorer and
//! the tailor adapter, with retry/backoff and per-instance cost accounting.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Error, Result};

use super::types::{lookup_model_spec, ChatMessage, ChatResponse, ChatRole, Provider, ProviderStats};

/// Base delay for exponential backoff on retryable provider errors.
const RETRY_BASE: Duration = Duration::from_secs(2);
/// Cap on a single backoff sleep.
const RETRY_CAP: Duration = Duration::from_secs(30);
/// Total attempts (first try plus retries) before a retryable error surfaces.
const MAX_ATTEMPTS: u32 = 3;

/// Uniform LLM call interface across vendors (§4.2 of the provider contract).
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// A single request/response. Implementations retry on rate-limit or
    /// transport errors with exponential backoff; callers see only the
    /// final outcome.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> Result<ChatResponse>;

    /// Pure pricing function: cost in USD for the given token counts.
    fn cost_for(&self, input_tokens: u64, output_tokens: u64) -> f64;

    /// Which vendor this client talks to.
    fn provider(&self) -> Provider;

    /// Running totals accumulated across every `chat` call on this instance.
    fn stats(&self) -> ProviderStats;

    /// Zero the running totals.
    fn reset_stats(&self);
}

/// Shared cost/token accumulator embedded in each concrete client.
#[derive(Default)]
struct StatsAccumulator {
    total_cost_usd_micros: AtomicU64,
    total_input_tokens: AtomicU64,
    total_output_tokens: AtomicU64,
    total_calls: AtomicU64,
}

impl StatsAccumulator {
    fn record(&self, input_tokens: u64, output_tokens: u64, cost_usd: f64) {
        self.total_input_tokens.fetch_add(input_tokens, Ordering::Relaxed);
        self.total_output_tokens.fetch_add(output_tokens, Ordering::Relaxed);
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        // Store cost as micro-dollars so the accumulator stays lock-free.
        let micros = (cost_usd * 1_000_000.0).round() as u64;
        self.total_cost_usd_micros.fetch_add(micros, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ProviderStats {
        ProviderStats {
            total_cost_usd: self.total_cost_usd_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            total_input_tokens: self.total_input_tokens.load(Ordering::Relaxed),
            total_output_tokens: self.total_output_tokens.load(Ordering::Relaxed),
            total_calls: self.total_calls.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.total_cost_usd_micros.store(0, Ordering::Relaxed);
        self.total_input_tokens.store(0, Ordering::Relaxed);
        self.total_output_tokens.store(0, Ordering::Relaxed);
        self.total_calls.store(0, Ordering::Relaxed);
    }
}

/// Configuration shared by every concrete provider client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            model: model.into(),
            timeout_secs: 60,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

fn build_http_client(timeout_secs: u64) -> Client {
    let timeout = Duration::from_secs(timeout_secs);
    // Some sandboxed environments panic during proxy auto-detection in
    // reqwest's default client builder; fall back to no-proxy in that case.
    match catch_unwind(AssertUnwindSafe(|| Client::builder().timeout(timeout).build())) {
        Ok(Ok(client)) => client,
        Ok(Err(_)) | Err(_) => Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client"),
    }
}

/// Runs `attempt` up to [`MAX_ATTEMPTS`] times, sleeping with exponential
/// backoff (base 2s, cap 30s) between retryable failures. Non-retryable
/// errors (e.g. `InvalidResponse`) surface on the first occurrence.
async fn with_retry<F, Fut>(provider: Provider, mut attempt: F) -> Result<ChatResponse>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<ChatResponse>>,
{
    let mut delay = RETRY_BASE;
    let mut last_err = None;
    for attempt_no in 1..=MAX_ATTEMPTS {
        match attempt().await {
            Ok(response) => return Ok(response),
            Err(err) if err.is_retryable() && attempt_no < MAX_ATTEMPTS => {
                tracing::warn!(
                    provider = %provider,
                    attempt = attempt_no,
                    error = %err,
                    "retrying provider call after backoff"
                );
                sleep(delay).await;
                delay = (delay * 2).min(RETRY_CAP);
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.unwrap_or_else(|| Error::transport(provider.to_string(), "retries exhausted")))
}

// ---------------------------------------------------------------------
// Anthropic
// ---------------------------------------------------------------------

pub struct AnthropicClient {
    config: ClientConfig,
    http: Client,
    stats: StatsAccumulator,
}

impl AnthropicClient {
    const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";
    const API_VERSION: &'static str = "2023-06-01";

    pub fn new(config: ClientConfig) -> Self {
        let http = build_http_client(config.timeout_secs);
        Self {
            config,
            http,
            stats: StatsAccumulator::default(),
        }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(Self::DEFAULT_BASE_URL)
    }

    async fn chat_once(&self, messages: &[ChatMessage], temperature: f64, max_tokens: u32) -> Result<ChatResponse> {
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<ReqMessage>,
            max_tokens: u32,
            #[serde(skip_serializing_if = "Option::is_none")]
            system: Option<&'a str>,
            temperature: f64,
        }
        #[derive(Serialize)]
        struct ReqMessage {
            role: &'static str,
            content: String,
        }
        #[derive(Deserialize)]
        struct Resp {
            content: Vec<RespContent>,
            usage: RespUsage,
        }
        #[derive(Deserialize)]
        struct RespContent {
            text: Option<String>,
        }
        #[derive(Deserialize)]
        struct RespUsage {
            input_tokens: u64,
            output_tokens: u64,
        }
        #[derive(Deserialize)]
        struct ErrBody {
            error: ErrDetail,
        }
        #[derive(Deserialize)]
        struct ErrDetail {
            message: String,
        }

        let system = messages
            .iter()
            .find(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str());
        let turns: Vec<ReqMessage> = messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| ReqMessage {
                role: if m.role == ChatRole::Assistant { "assistant" } else { "user" },
                content: m.content.clone(),
            })
            .collect();

        let req = Req {
            model: &self.config.model,
            messages: turns,
            max_tokens,
            system,
            temperature,
        };

        let provider = Provider::Anthropic;
        let url = format!("{}/v1/messages", self.base_url());
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(&req)
            .send()
            .await
            .map_err(|e| transport_err(provider, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_err(provider, &e))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::rate_limited(provider.to_string(), body));
        }
        if !status.is_success() {
            let message = serde_json::from_str::<ErrBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(Error::api_error(provider.to_string(), message));
        }

        let parsed: Resp = serde_json::from_str(&body)
            .map_err(|e| Error::api_error(provider.to_string(), format!("unparseable response: {e}")))?;
        let content = parsed.content.into_iter().filter_map(|c| c.text).collect::<Vec<_>>().join("");
        let cost = self.cost_for(parsed.usage.input_tokens, parsed.usage.output_tokens);
        self.stats.record(parsed.usage.input_tokens, parsed.usage.output_tokens, cost);

        Ok(ChatResponse {
            content,
            usage: super::types::TokenUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
            cost_usd: cost,
            model: self.config.model.clone(),
            timestamp: Utc::now(),
        })
    }
}

fn transport_err(provider: Provider, e: &reqwest::Error) -> Error {
    if e.is_timeout() || e.is_connect() {
        Error::transport(provider.to_string(), e.to_string())
    } else {
        Error::api_error(provider.to_string(), e.to_string())
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    async fn chat(&self, messages: &[ChatMessage], temperature: f64, max_tokens: u32) -> Result<ChatResponse> {
        with_retry(Provider::Anthropic, || self.chat_once(messages, temperature, max_tokens)).await
    }

    fn cost_for(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        lookup_model_spec(&self.config.model, Provider::Anthropic).calculate_cost(input_tokens, output_tokens)
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn stats(&self) -> ProviderStats {
        self.stats.snapshot()
    }

    fn reset_stats(&self) {
        self.stats.reset();
    }
}

// ---------------------------------------------------------------------
// OpenAI (also used for OpenRouter via a compatible base_url override)
// ---------------------------------------------------------------------

pub struct OpenAIClient {
    config: ClientConfig,
    http: Client,
    stats: StatsAccumulator,
    provider: Provider,
}

impl OpenAIClient {
    const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";

    pub fn new(config: ClientConfig) -> Self {
        Self::with_provider(config, Provider::OpenAI)
    }

    pub fn with_provider(config: ClientConfig, provider: Provider) -> Self {
        let http = build_http_client(config.timeout_secs);
        Self {
            config,
            http,
            stats: StatsAccumulator::default(),
            provider,
        }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(Self::DEFAULT_BASE_URL)
    }

    async fn chat_once(&self, messages: &[ChatMessage], temperature: f64, max_tokens: u32) -> Result<ChatResponse> {
        #[derive(Serialize)]
        struct ReqMessage {
            role: &'static str,
            content: String,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<ReqMessage>,
            max_tokens: u32,
            temperature: f64,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<RespChoice>,
            usage: RespUsage,
        }
        #[derive(Deserialize)]
        struct RespChoice {
            message: RespMessage,
        }
        #[derive(Deserialize)]
        struct RespMessage {
            content: String,
        }
        #[derive(Deserialize)]
        struct RespUsage {
            prompt_tokens: u64,
            completion_tokens: u64,
        }
        #[derive(Deserialize)]
        struct ErrBody {
            error: ErrDetail,
        }
        #[derive(Deserialize)]
        struct ErrDetail {
            message: String,
        }

        let req = Req {
            model: &self.config.model,
            messages: messages
                .iter()
                .map(|m| ReqMessage {
                    role: match m.role {
                        ChatRole::System => "system",
                        ChatRole::User => "user",
                        ChatRole::Assistant => "assistant",
                    },
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens,
            temperature,
        };

        let url = format!("{}/v1/chat/completions", self.base_url());
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| transport_err(self.provider, &e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| transport_err(self.provider, &e))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::rate_limited(self.provider.to_string(), body));
        }
        if !status.is_success() {
            let message = serde_json::from_str::<ErrBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(Error::api_error(self.provider.to_string(), message));
        }

        let parsed: Resp = serde_json::from_str(&body)
            .map_err(|e| Error::api_error(self.provider.to_string(), format!("unparseable response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        let cost = self.cost_for(parsed.usage.prompt_tokens, parsed.usage.completion_tokens);
        self.stats.record(parsed.usage.prompt_tokens, parsed.usage.completion_tokens, cost);

        Ok(ChatResponse {
            content,
            usage: super::types::TokenUsage {
                input_tokens: parsed.usage.prompt_tokens,
                output_tokens: parsed.usage.completion_tokens,
            },
            cost_usd: cost,
            model: self.config.model.clone(),
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl ProviderClient for OpenAIClient {
    async fn chat(&self, messages: &[ChatMessage], temperature: f64, max_tokens: u32) -> Result<ChatResponse> {
        with_retry(self.provider, || self.chat_once(messages, temperature, max_tokens)).await
    }

    fn cost_for(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        lookup_model_spec(&self.config.model, self.provider).calculate_cost(input_tokens, output_tokens)
    }

    fn provider(&self) -> Provider {
        self.provider
    }

    fn stats(&self) -> ProviderStats {
        self.stats.snapshot()
    }

    fn reset_stats(&self) {
        self.stats.reset();
    }
}

/// Extracts a JSON object from LLM output per the structured-response
/// contract: try the raw text, then a fenced ```json``` block, then the
/// largest balanced `{...}` region. Fails with `InvalidResponse` if none
/// parse.
pub fn parse_structured_response(text: &str) -> Result<serde_json::Value> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text.trim()) {
        return Ok(value);
    }

    if let Some(fenced) = extract_fenced_block(text) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(fenced.trim()) {
            return Ok(value);
        }
    }

    if let Some(braces) = largest_balanced_braces(text) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&braces) {
            return Ok(value);
        }
    }

    Err(Error::invalid_response(format!(
        "no parseable JSON object found in provider response: {text}"
    )))
}

fn extract_fenced_block(text: &str) -> Option<&str> {
    let start_marker_json = "```json";
    let start_marker_bare = "```";
    let (start_idx, marker_len) = if let Some(idx) = text.find(start_marker_json) {
        (idx, start_marker_json.len())
    } else {
        let idx = text.find(start_marker_bare)?;
        (idx, start_marker_bare.len())
    };
    let after = &text[start_idx + marker_len..];
    let end_idx = after.find("```")?;
    Some(&after[..end_idx])
}

/// Scans for the largest region delimited by balanced `{`/`}` braces.
fn largest_balanced_braces(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut best: Option<(usize, usize)> = None;
    let mut stack: Vec<usize> = Vec::new();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => stack.push(i),
            b'}' => {
                if let Some(start) = stack.pop() {
                    if stack.is_empty() {
                        let len = i - start + 1;
                        let better = match best {
                            Some((bs, be)) => len > (be - bs + 1),
                            None => true,
                        };
                        if better {
                            best = Some((start, i));
                        }
                    }
                }
            }
            _ => {}
        }
    }
    best.map(|(s, e)| text[s..=e].to_string())
}

#[cfg(feature = "gemini")]
pub struct GoogleClient {
    config: ClientConfig,
    http: Client,
    stats: StatsAccumulator,
}

#[cfg(feature = "gemini")]
impl GoogleClient {
    const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";

    pub fn new(config: ClientConfig) -> Self {
        let http = build_http_client(config.timeout_secs);
        Self {
            config,
            http,
            stats: StatsAccumulator::default(),
        }
    }

    async fn chat_once(&self, messages: &[ChatMessage], temperature: f64, max_tokens: u32) -> Result<ChatResponse> {
        #[derive(Serialize)]
        struct Part {
            text: String,
        }
        #[derive(Serialize)]
        struct Content {
            role: &'static str,
            parts: Vec<Part>,
        }
        #[derive(Serialize)]
        struct GenerationConfig {
            temperature: f64,
            #[serde(rename = "maxOutputTokens")]
            max_output_tokens: u32,
        }
        #[derive(Serialize)]
        struct SystemInstruction {
            parts: Vec<Part>,
        }
        #[derive(Serialize)]
        struct Req {
            contents: Vec<Content>,
            #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
            system_instruction: Option<SystemInstruction>,
            #[serde(rename = "generationConfig")]
            generation_config: GenerationConfig,
        }
        #[derive(Deserialize)]
        struct Resp {
            candidates: Vec<Candidate>,
            #[serde(rename = "usageMetadata")]
            usage_metadata: UsageMetadata,
        }
        #[derive(Deserialize)]
        struct Candidate {
            content: CandidateContent,
        }
        #[derive(Deserialize)]
        struct CandidateContent {
            parts: Vec<Part>,
        }
        #[derive(Deserialize)]
        struct UsageMetadata {
            #[serde(rename = "promptTokenCount")]
            prompt_token_count: u64,
            #[serde(rename = "candidatesTokenCount")]
            candidates_token_count: u64,
        }

        let system_instruction = messages
            .iter()
            .find(|m| m.role == ChatRole::System)
            .map(|m| SystemInstruction {
                parts: vec![Part { text: m.content.clone() }],
            });

        let req = Req {
            contents: messages
                .iter()
                .filter(|m| m.role != ChatRole::System)
                .map(|m| Content {
                    role: if m.role == ChatRole::Assistant { "model" } else { "user" },
                    parts: vec![Part { text: m.content.clone() }],
                })
                .collect(),
            system_instruction,
            generation_config: GenerationConfig {
                temperature,
                max_output_tokens: max_tokens,
            },
        };

        let base = self.config.base_url.as_deref().unwrap_or(Self::DEFAULT_BASE_URL);
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            base, self.config.model, self.config.api_key
        );
        let response = self
            .http
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| transport_err(Provider::Google, &e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| transport_err(Provider::Google, &e))?;
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::rate_limited(Provider::Google.to_string(), body));
        }
        if !status.is_success() {
            return Err(Error::api_error(Provider::Google.to_string(), body));
        }
        let parsed: Resp = serde_json::from_str(&body)
            .map_err(|e| Error::api_error(Provider::Google.to_string(), format!("unparseable response: {e}")))?;
        let content = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
            .unwrap_or_default();
        let cost = self.cost_for(parsed.usage_metadata.prompt_token_count, parsed.usage_metadata.candidates_token_count);
        self.stats.record(
            parsed.usage_metadata.prompt_token_count,
            parsed.usage_metadata.candidates_token_count,
            cost,
        );
        Ok(ChatResponse {
            content,
            usage: super::types::TokenUsage {
                input_tokens: parsed.usage_metadata.prompt_token_count,
                output_tokens: parsed.usage_metadata.candidates_token_count,
            },
            cost_usd: cost,
            model: self.config.model.clone(),
            timestamp: Utc::now(),
        })
    }
}

#[cfg(feature = "gemini")]
#[async_trait]
impl ProviderClient for GoogleClient {
    async fn chat(&self, messages: &[ChatMessage], temperature: f64, max_tokens: u32) -> Result<ChatResponse> {
        with_retry(Provider::Google, || self.chat_once(messages, temperature, max_tokens)).await
    }

    fn cost_for(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        lookup_model_spec(&self.config.model, Provider::Google).calculate_cost(input_tokens, output_tokens)
    }

    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn stats(&self) -> ProviderStats {
        self.stats.snapshot()
    }

    fn reset_stats(&self) {
        self.stats.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_raw_json() {
        let value = parse_structured_response(r#"{"score": 90, "tier": "high"}"#).unwrap();
        assert_eq!(value["score"], 90);
    }

    #[test]
    fn parses_fenced_json_block() {
        let text = "Here is my answer:\n```json\n{\"score\": 72, \"tier\": \"medium\"}\n```\nThanks!";
        let value = parse_structured_response(text).unwrap();
        assert_eq!(value["score"], 72);
    }

    #[test]
    fn parses_bare_fenced_block() {
        let text = "```\n{\"score\": 10}\n```";
        let value = parse_structured_response(text).unwrap();
        assert_eq!(value["score"], 10);
    }

    #[test]
    fn extracts_largest_balanced_braces_from_prose() {
        let text = "I considered {irrelevant} but my answer is {\"score\": 45, \"tier\": \"low\"} as shown above.";
        let value = parse_structured_response(text).unwrap();
        assert_eq!(value["score"], 45);
    }

    #[test]
    fn rejects_unparseable_text() {
        let err = parse_structured_response("no json here at all").unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn cost_for_matches_known_model_pricing() {
        let client = AnthropicClient::new(ClientConfig::new("key", "claude-3-5-haiku-20241022"));
        let cost = client.cost_for(1_000_000, 1_000_000);
        assert!((cost - 4.8).abs() < 1e-9);
    }
}
