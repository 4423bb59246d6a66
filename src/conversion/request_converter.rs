//! Chat options to vendor request conversion
//!
//! Builds the vendor-specific JSON payloads from provider-neutral chat
//! options, and trims the conversation history sent upstream.

use crate::conversion::response_converter::strip_thinking;
use crate::models::chat::{ChatMessage, ChatOptions, MessageContent, MessageRole};
use crate::models::soochowlife::SoochowLifeRequestPayload;
use crate::models::tencent::TencentRequestPayload;
use serde::Serialize;
use tracing::debug;

/// Throttle hint telling LKE to push every update
const TENCENT_STREAMING_THROTTLE: u32 = 1;

/// Message as replayed to a text-only vendor
#[derive(Debug, Clone, Serialize)]
pub struct PlainMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Reduce messages to plain text. Assistant turns lose their quoted
/// reasoning so it is not fed back to the model.
pub fn to_plain_messages(messages: &[ChatMessage]) -> Vec<PlainMessage> {
    messages
        .iter()
        .map(|m| PlainMessage {
            role: m.role,
            content: match m.role {
                MessageRole::Assistant => strip_thinking(m.content.text()),
                _ => m.content.text().to_string(),
            },
        })
        .collect()
}

/// Join the content of every message with `role`, newest first
pub fn join_role_messages(messages: &[PlainMessage], role: MessageRole) -> String {
    messages
        .iter()
        .rev()
        .filter(|m| m.role == role)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep all system messages plus the newest `count` other messages.
///
/// At least one non-system message is always kept so the current user turn
/// reaches the vendor.
pub fn truncate_history(messages: Vec<ChatMessage>, count: u32) -> Vec<ChatMessage> {
    let keep = count.max(1) as usize;
    let conversational = messages
        .iter()
        .filter(|m| m.role != MessageRole::System)
        .count();
    if conversational <= keep {
        return messages;
    }

    let mut to_skip = conversational - keep;
    debug!(
        "Truncating history: {} conversational messages -> {}",
        conversational, keep
    );
    messages
        .into_iter()
        .filter(|m| {
            if m.role == MessageRole::System {
                return true;
            }
            if to_skip > 0 {
                to_skip -= 1;
                return false;
            }
            true
        })
        .collect()
}

/// Build the LKE chat request
pub fn convert_to_tencent(
    options: &ChatOptions,
    bot_app_key: &str,
    request_id: String,
) -> Result<TencentRequestPayload, serde_json::Error> {
    let messages = to_plain_messages(&options.messages);
    Ok(TencentRequestPayload {
        request_id,
        content: serde_json::to_string(&messages)?,
        session_id: options.session.id.clone(),
        bot_app_key: bot_app_key.to_string(),
        visitor_biz_id: options.session.id.clone(),
        system_role: join_role_messages(&messages, MessageRole::System),
        streaming_throttle: TENCENT_STREAMING_THROTTLE,
    })
}

/// Build the SoochowLife request; only the latest message is sent
pub fn convert_to_soochowlife(options: &ChatOptions) -> SoochowLifeRequestPayload {
    let message = options
        .messages
        .last()
        .map(|m| m.content.clone())
        .unwrap_or_else(|| MessageContent::Text(String::new()));
    SoochowLifeRequestPayload {
        message,
        user_id: options.session.id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{ChatSession, ContentPart, ImageUrl, ModelConfig};

    fn options(messages: Vec<ChatMessage>) -> ChatOptions {
        ChatOptions {
            messages,
            config: ModelConfig::new("tencent-bot"),
            session: ChatSession::new("session-1"),
        }
    }

    #[test]
    fn test_tencent_payload_fields() {
        let opts = options(vec![
            ChatMessage::new(MessageRole::System, "be brief"),
            ChatMessage::new(MessageRole::User, "hi"),
            ChatMessage::new(MessageRole::Assistant, "> thinking\n\nhello"),
            ChatMessage::new(MessageRole::System, "answer in English"),
            ChatMessage::new(MessageRole::User, "weather?"),
        ]);
        let payload = convert_to_tencent(&opts, "bot-key", "req-1".into()).unwrap();

        assert_eq!(payload.request_id, "req-1");
        assert_eq!(payload.session_id, "session-1");
        assert_eq!(payload.visitor_biz_id, "session-1");
        assert_eq!(payload.bot_app_key, "bot-key");
        assert_eq!(payload.streaming_throttle, 1);
        assert_eq!(payload.system_role, "answer in English\nbe brief");

        let content: serde_json::Value = serde_json::from_str(&payload.content).unwrap();
        assert_eq!(content.as_array().unwrap().len(), 5);
        assert_eq!(content[2]["role"], "assistant");
        assert_eq!(content[2]["content"], "hello");
    }

    #[test]
    fn test_soochowlife_payload_keeps_multimodal_content() {
        let parts = MessageContent::Parts(vec![
            ContentPart::Text {
                text: "what is this".into(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "https://img/x.png".into(),
                },
            },
        ]);
        let opts = options(vec![
            ChatMessage::new(MessageRole::User, "earlier"),
            ChatMessage {
                role: MessageRole::User,
                content: parts.clone(),
            },
        ]);
        let payload = convert_to_soochowlife(&opts);
        assert_eq!(payload.message, parts);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["userId"], "session-1");
        assert_eq!(json["message"][1]["type"], "image_url");
    }

    #[test]
    fn test_truncate_history_keeps_system_and_latest() {
        let messages = vec![
            ChatMessage::new(MessageRole::System, "sys"),
            ChatMessage::new(MessageRole::User, "a"),
            ChatMessage::new(MessageRole::Assistant, "b"),
            ChatMessage::new(MessageRole::User, "c"),
        ];
        let kept = truncate_history(messages, 2);
        let texts: Vec<_> = kept.iter().map(|m| m.content.text()).collect();
        assert_eq!(texts, vec!["sys", "b", "c"]);
    }

    #[test]
    fn test_truncate_history_zero_keeps_current_turn() {
        let messages = vec![
            ChatMessage::new(MessageRole::User, "old"),
            ChatMessage::new(MessageRole::User, "new"),
        ];
        let kept = truncate_history(messages, 0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].content.text(), "new");
    }
}
