//! Tencent LKE bot provider implementation

use crate::conversion::request_converter::convert_to_tencent;
use crate::conversion::response_converter::{ParsedItem, SseChunkParser, ThinkChunk, trim_topic};
use crate::core::client::{ChatHttpClient, default_headers};
use crate::core::config::{RequestConfig, TencentConfig};
use crate::core::constants::tencent;
use crate::core::provider::{ChatEventStream, LlmApi, ProviderError};
use crate::models::chat::{
    ChatEvent, ChatOptions, DEFAULT_TOPIC, LlmModel, LlmModelProvider, LlmUsage, SpeechOptions,
};
use crate::models::tencent::{TencentFrameType, TencentReplyPayload, TencentResponseFrame};
use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tencent LKE bot provider
pub struct TencentProvider {
    http: ChatHttpClient,
    settings: TencentConfig,
    request: RequestConfig,
    access_code: Option<String>,
}

impl TencentProvider {
    pub fn new(
        http: ChatHttpClient,
        settings: TencentConfig,
        request: RequestConfig,
        access_code: Option<String>,
    ) -> Self {
        Self {
            http,
            settings,
            request,
            access_code,
        }
    }

    fn chat_url(&self) -> String {
        format!(
            "{}{}",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.chat_path
        )
    }
}

/// Reply text of a non-streaming answer
pub fn extract_message(response: &Value) -> String {
    response
        .pointer("/output/choices/0/message/content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Part of `full` not yet seen, then remember `full`.
///
/// LKE resends the whole text in every frame.
fn take_increment(seen: &mut String, full: &str) -> String {
    let delta = match full.strip_prefix(seen.as_str()) {
        Some(rest) => rest,
        None => full.get(seen.len()..).unwrap_or(""),
    };
    let delta = delta.to_string();
    *seen = full.to_string();
    delta
}

/// Decodes LKE SSE frames for one chat call
#[derive(Debug, Default)]
pub struct TencentStreamParser {
    reply_text: String,
    thought_text: String,
    topic: Option<String>,
}

impl TencentStreamParser {
    fn topic_item(&mut self, payload: &TencentReplyPayload) -> Option<ParsedItem> {
        if payload.from_name.is_empty() {
            return None;
        }
        let mut topic = trim_topic(&payload.from_name);
        if topic.is_empty() {
            topic = DEFAULT_TOPIC.to_string();
        }
        if self.topic.as_deref() == Some(topic.as_str()) {
            return None;
        }
        self.topic = Some(topic.clone());
        Some(ParsedItem::Topic(topic))
    }
}

impl SseChunkParser for TencentStreamParser {
    fn parse(&mut self, data: &str) -> Vec<ParsedItem> {
        let frame: TencentResponseFrame = match serde_json::from_str(data) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to parse Tencent frame: {}, error: {}", data, e);
                return vec![ParsedItem::Error(format!("Failed to process chunk: {}", data))];
            }
        };

        match frame.frame_type {
            TencentFrameType::Reply | TencentFrameType::Thought => {
                let Some(payload) = frame.payload else {
                    return Vec::new();
                };
                if payload.is_from_self {
                    return Vec::new();
                }
                if payload.is_final {
                    debug!(
                        "Tencent final frame: request_id={}, session={}, record_id={}, trace_id={}",
                        payload.request_id, payload.session_id, payload.record_id, payload.trace_id
                    );
                }

                let mut items = Vec::with_capacity(2);
                if let Some(topic) = self.topic_item(&payload) {
                    items.push(topic);
                }

                if frame.frame_type == TencentFrameType::Reply {
                    let delta = take_increment(&mut self.reply_text, &payload.content);
                    items.push(ParsedItem::Content(ThinkChunk::reply(delta)));
                } else {
                    match payload.procedures.first() {
                        Some(procedure) => {
                            let delta =
                                take_increment(&mut self.thought_text, &procedure.debugging.content);
                            items.push(ParsedItem::Content(ThinkChunk::thought(delta)));
                        }
                        None => items.push(ParsedItem::Error(
                            "Thought frame carried no procedures".to_string(),
                        )),
                    }
                }
                items
            }
            TencentFrameType::Error => {
                if let Some(code) = frame.error.as_ref().and_then(|e| e.code) {
                    debug!("Tencent error code {}", code);
                }
                let message = frame
                    .error
                    .map(|e| e.message)
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Unknown Tencent error".to_string());
                warn!("Tencent stream error: {}", message);
                vec![ParsedItem::Error(message)]
            }
            TencentFrameType::Other => Vec::new(),
        }
    }
}

#[async_trait]
impl LlmApi for TencentProvider {
    async fn chat(
        &self,
        options: ChatOptions,
        cancel: CancellationToken,
    ) -> Result<ChatEventStream, ProviderError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let payload = convert_to_tencent(&options, &self.settings.bot_app_key, request_id)
            .map_err(|e| ProviderError::Unexpected(format!("Failed to encode messages: {}", e)))?;

        info!(
            "Sending request to Tencent: request_id={}, session={}, messages={}, stream={}",
            payload.request_id,
            payload.session_id,
            options.messages.len(),
            options.config.stream
        );
        debug!("Tencent payload: {:?}", payload);

        let url = self.chat_url();
        let headers = default_headers(self.access_code.as_deref());
        let timeout_ms = self.request.timeout_ms_for_model(&options.config.model);

        if options.config.stream {
            return self
                .http
                .stream_with_think(
                    &url,
                    headers,
                    &payload,
                    TencentStreamParser::default(),
                    timeout_ms,
                    cancel,
                )
                .await;
        }

        let response = self
            .http
            .post_json(&url, headers, &payload, timeout_ms, &cancel)
            .await?;
        let status = response.status().as_u16();
        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Unexpected(format!("Failed to parse response: {}", e)))?;
        let message = extract_message(&body);

        Ok(Box::pin(futures::stream::once(async move {
            ChatEvent::Finish { message, status }
        })))
    }

    async fn models(&self) -> Result<Vec<LlmModel>, ProviderError> {
        Ok(vec![LlmModel {
            name: tencent::MODEL.to_string(),
            display_name: None,
            available: true,
            sorted: 1000,
            provider: LlmModelProvider {
                id: tencent::PROVIDER_ID.to_string(),
                provider_name: tencent::PROVIDER_NAME.to_string(),
                provider_type: tencent::PROVIDER_ID.to_string(),
                sorted: 0,
            },
        }])
    }

    async fn usage(&self) -> Result<LlmUsage, ProviderError> {
        Ok(LlmUsage::default())
    }

    async fn speech(&self, _options: SpeechOptions) -> Result<Vec<u8>, ProviderError> {
        Err(ProviderError::Unsupported(
            "Speech not supported by Tencent Bot".to_string(),
        ))
    }

    fn provider_name(&self) -> &str {
        tencent::PROVIDER_NAME
    }
}
