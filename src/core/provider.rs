//! Unified client interface for LLM vendors
//!
//! Every vendor adapter implements `LlmApi` so the gateway can drive
//! Tencent, SoochowLife and future vendors the same way.

use crate::models::chat::{ChatEvent, ChatOptions, LlmModel, LlmUsage, SpeechOptions};
use async_trait::async_trait;
use futures::stream::Stream;
use std::fmt;
use std::pin::Pin;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Error types for provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Request cancelled by client")]
    Cancelled,

    #[error("{0}")]
    Unsupported(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ProviderError {
    /// Map an upstream failure status and body onto an error variant
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => ProviderError::Authentication(message),
            429 => ProviderError::RateLimit(message),
            400 => ProviderError::BadRequest(message),
            _ => ProviderError::ApiError { status, message },
        }
    }

    /// HTTP status the gateway answers with for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ProviderError::Authentication(_) => 401,
            ProviderError::RateLimit(_) => 429,
            ProviderError::BadRequest(_) => 400,
            ProviderError::ApiError { status, .. } => *status,
            ProviderError::Timeout(_) => 504,
            ProviderError::Cancelled => 499,
            ProviderError::Unsupported(_) => 501,
            ProviderError::Unexpected(_) => 500,
        }
    }

    /// Stable error kind reported in JSON error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Authentication(_) => "authentication_error",
            ProviderError::RateLimit(_) => "rate_limit_error",
            ProviderError::BadRequest(_) => "invalid_request_error",
            ProviderError::ApiError { .. } => "api_error",
            ProviderError::Timeout(_) => "timeout_error",
            ProviderError::Cancelled => "cancelled",
            ProviderError::Unsupported(_) => "unsupported",
            ProviderError::Unexpected(_) => "api_error",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Unexpected(e.to_string())
    }
}

pub type ChatEventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

/// Trait for LLM vendor clients
#[async_trait]
pub trait LlmApi: Send + Sync {
    /// Start a chat. Streaming chats emit updates as they arrive; a
    /// non-streaming chat emits a single `Finish`. Cancelling `cancel`
    /// aborts the upstream request.
    async fn chat(
        &self,
        options: ChatOptions,
        cancel: CancellationToken,
    ) -> Result<ChatEventStream, ProviderError>;

    /// Models offered by this vendor
    async fn models(&self) -> Result<Vec<LlmModel>, ProviderError>;

    /// Account usage
    async fn usage(&self) -> Result<LlmUsage, ProviderError>;

    /// Text to speech
    async fn speech(&self, options: SpeechOptions) -> Result<Vec<u8>, ProviderError>;

    fn provider_name(&self) -> &str;
}

/// Supported provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderType {
    Tencent,
    SoochowLife,
}

impl ProviderType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tencent" | "tencent-bot" => Some(ProviderType::Tencent),
            "soochowlife" | "soochow-life" | "soochow_life" => Some(ProviderType::SoochowLife),
            _ => None,
        }
    }

    pub fn all() -> [ProviderType; 2] {
        [ProviderType::Tencent, ProviderType::SoochowLife]
    }

    /// Key used in routes and the `[proxy.upstreams]` table
    pub fn id(&self) -> &'static str {
        match self {
            ProviderType::Tencent => crate::core::constants::tencent::PROVIDER_ID,
            ProviderType::SoochowLife => crate::core::constants::soochowlife::PROVIDER_ID,
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::Tencent => f.write_str(crate::core::constants::tencent::PROVIDER_NAME),
            ProviderType::SoochowLife => {
                f.write_str(crate::core::constants::soochowlife::PROVIDER_NAME)
            }
        }
    }
}
