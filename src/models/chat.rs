//! Provider-neutral chat data models
//!
//! These are the shapes the gateway accepts from its callers and hands to
//! every vendor client through the `LlmApi` trait.

use serde::{Deserialize, Serialize};

/// Session topic used until a vendor names the conversation
pub const DEFAULT_TOPIC: &str = "New Conversation";

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Image reference inside a multimodal message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One part of a multimodal message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Message content: plain text or a list of multimodal parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Text of the message. For multimodal content this is the first text part.
    pub fn text(&self) -> &str {
        match self {
            MessageContent::Text(s) => s,
            MessageContent::Parts(parts) => parts
                .iter()
                .find_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .unwrap_or(""),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
        }
    }
}

/// Per-conversation model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model: String,
    #[serde(default, rename = "providerName", alias = "provider_name")]
    pub provider_name: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(
        default = "default_history_message_count",
        rename = "historyMessageCount",
        alias = "history_message_count"
    )]
    pub history_message_count: u32,
    #[serde(default, rename = "compressModel", alias = "compress_model")]
    pub compress_model: Option<String>,
    #[serde(
        default,
        rename = "compressProviderName",
        alias = "compress_provider_name"
    )]
    pub compress_provider_name: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

fn default_temperature() -> f32 {
    0.5
}

fn default_top_p() -> f32 {
    1.0
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_history_message_count() -> u32 {
    4
}

pub const MIN_MAX_TOKENS: u32 = 1024;
pub const MAX_MAX_TOKENS: u32 = 512_000;
pub const MAX_HISTORY_MESSAGE_COUNT: u32 = 64;

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            provider_name: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            history_message_count: default_history_message_count(),
            compress_model: None,
            compress_provider_name: None,
            stream: false,
        }
    }

    /// Clamp every numeric setting into the range the settings form allows
    pub fn validated(mut self) -> Self {
        self.temperature = clamp_unit(self.temperature);
        self.top_p = clamp_unit(self.top_p);
        self.max_tokens = self.max_tokens.clamp(MIN_MAX_TOKENS, MAX_MAX_TOKENS);
        self.history_message_count = self.history_message_count.min(MAX_HISTORY_MESSAGE_COUNT);
        self
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

impl ChatSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            topic: default_topic(),
        }
    }

    pub fn fresh() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}

/// Everything a vendor client needs for one chat call
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub messages: Vec<ChatMessage>,
    pub config: ModelConfig,
    pub session: ChatSession,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmModelProvider {
    pub id: String,
    pub provider_name: String,
    pub provider_type: String,
    pub sorted: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmModel {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub available: bool,
    pub sorted: u32,
    pub provider: LlmModelProvider,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub used: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechOptions {
    pub model: String,
    pub input: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub response_format: Option<String>,
    #[serde(default)]
    pub speed: Option<f32>,
}

/// Incremental output of a chat call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Assembled text so far plus the piece that was just added
    Update { text: String, delta: String },
    /// The vendor renamed the conversation
    Topic { topic: String },
    /// Vendor-reported error that does not end the stream
    Error { message: String },
    /// Final message; always the last event
    Finish { message: String, status: u16 },
}

impl ChatEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::Update { .. } => "update",
            ChatEvent::Topic { .. } => "topic",
            ChatEvent::Error { .. } => "error",
            ChatEvent::Finish { .. } => "finish",
        }
    }
}
