//! Error types for jobhunter-core.

use thiserror::Error;

/// Result type alias using jobhunter-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur anywhere in the ingest-to-decision pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or unparseable configuration. Fatal at pipeline start.
    #[error("configuration error: {0}")]
    Config(String),

    /// A job record collides with an existing `url_hash` or `(platform, external_id)` pair.
    #[error("duplicate job: {0}")]
    Duplicate(String),

    /// A query referenced an id that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store detected a state it should never be able to reach.
    #[error("store integrity error: {0}")]
    Integrity(String),

    /// A source record is missing a required field (title, company, or url).
    #[error("invalid import record: {0}")]
    InvalidRecord(String),

    /// Provider returned HTTP 429 or an equivalent rate-limit signal.
    #[error("rate limited by {provider}: {message}")]
    RateLimited { provider: String, message: String },

    /// Provider returned a non-success response.
    #[error("provider API error ({provider}): {message}")]
    ApiError { provider: String, message: String },

    /// Provider's response content could not be parsed into the expected JSON shape.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Request to the provider timed out or the connection failed.
    #[error("provider transport error ({provider}): {message}")]
    Transport { provider: String, message: String },

    /// Underlying SQLite error not otherwise classified above.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML configuration file failed to parse.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Filesystem I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violation; should not occur in correct code.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::Duplicate(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord(message.into())
    }

    pub fn rate_limited(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RateLimited {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn api_error(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ApiError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether the error is worth retrying (rate limit or transport hiccup).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transport { .. })
    }
}
