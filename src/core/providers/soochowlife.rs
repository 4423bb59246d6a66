//! SoochowLife provider implementation

use crate::conversion::request_converter::convert_to_soochowlife;
use crate::conversion::response_converter::{ParsedItem, SseChunkParser, ThinkChunk};
use crate::core::client::{ChatHttpClient, default_headers};
use crate::core::config::{RequestConfig, SoochowLifeConfig};
use crate::core::constants::{api_path, soochowlife};
use crate::core::provider::{ChatEventStream, LlmApi, ProviderError};
use crate::models::chat::{
    ChatEvent, ChatOptions, LlmModel, LlmModelProvider, LlmUsage, SpeechOptions,
};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// SoochowLife provider
pub struct SoochowLifeProvider {
    http: ChatHttpClient,
    settings: SoochowLifeConfig,
    request: RequestConfig,
    access_code: Option<String>,
    /// Origin of this gateway, used when the vendor is reached through the proxy route
    gateway_origin: String,
}

/// Pick the vendor base URL.
///
/// A custom URL wins when enabled. Otherwise direct mode uses the
/// configured vendor URL and proxied mode uses the gateway's own
/// `/api/soochowLife` route. Bare hosts get an `https://` scheme.
pub fn resolve_base_url(settings: &SoochowLifeConfig) -> String {
    let mut base_url = if settings.use_custom_config {
        settings.url.clone()
    } else {
        String::new()
    };

    if base_url.is_empty() {
        base_url = if settings.is_app {
            settings.base_url.clone()
        } else {
            api_path::SOOCHOW_LIFE.to_string()
        };
    }

    if base_url.ends_with('/') {
        base_url.pop();
    }
    if !base_url.starts_with("http") && !base_url.starts_with(api_path::SOOCHOW_LIFE) {
        base_url = format!("https://{}", base_url);
    }
    base_url
}

impl SoochowLifeProvider {
    pub fn new(
        http: ChatHttpClient,
        settings: SoochowLifeConfig,
        request: RequestConfig,
        access_code: Option<String>,
        gateway_origin: String,
    ) -> Self {
        Self {
            http,
            settings,
            request,
            access_code,
            gateway_origin,
        }
    }

    /// Absolute URL of a vendor path
    pub fn path(&self, path: &str) -> String {
        let base_url = resolve_base_url(&self.settings);
        let url = if base_url.starts_with(api_path::SOOCHOW_LIFE) {
            format!("{}{}{}", self.gateway_origin.trim_end_matches('/'), base_url, path)
        } else {
            format!("{}{}", base_url, path)
        };
        debug!("[Proxy Endpoint] {}", url);
        url
    }
}

/// SoochowLife streams bare reply text in each data payload
#[derive(Debug, Default)]
pub struct SoochowLifeStreamParser;

impl SseChunkParser for SoochowLifeStreamParser {
    fn parse(&mut self, data: &str) -> Vec<ParsedItem> {
        vec![ParsedItem::Content(ThinkChunk::reply(data))]
    }
}

#[async_trait]
impl LlmApi for SoochowLifeProvider {
    async fn chat(
        &self,
        options: ChatOptions,
        cancel: CancellationToken,
    ) -> Result<ChatEventStream, ProviderError> {
        let payload = convert_to_soochowlife(&options);
        info!(
            "Sending request to SoochowLife: user={}, stream={}",
            payload.user_id, options.config.stream
        );
        debug!("SoochowLife payload: {:?}", payload);

        let url = self.path(&self.settings.chat_path);
        let headers = default_headers(self.access_code.as_deref());
        let timeout_ms = self.request.timeout_ms_for_model(&options.config.model);

        if options.config.stream {
            return self
                .http
                .stream_with_think(
                    &url,
                    headers,
                    &payload,
                    SoochowLifeStreamParser,
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
        let message = response
            .text()
            .await
            .map_err(|e| ProviderError::Unexpected(format!("Failed to read response: {}", e)))?;

        Ok(Box::pin(futures::stream::once(async move {
            ChatEvent::Finish { message, status }
        })))
    }

    async fn models(&self) -> Result<Vec<LlmModel>, ProviderError> {
        Ok(vec![LlmModel {
            name: soochowlife::MODEL.to_string(),
            display_name: None,
            available: true,
            sorted: 15,
            provider: LlmModelProvider {
                id: soochowlife::PROVIDER_ID.to_string(),
                provider_name: soochowlife::PROVIDER_NAME.to_string(),
                provider_type: soochowlife::PROVIDER_ID.to_string(),
                sorted: 15,
            },
        }])
    }

    async fn usage(&self) -> Result<LlmUsage, ProviderError> {
        Ok(LlmUsage::default())
    }

    async fn speech(&self, _options: SpeechOptions) -> Result<Vec<u8>, ProviderError> {
        Err(ProviderError::Unsupported(
            "Speech not supported by SoochowLife".to_string(),
        ))
    }

    fn provider_name(&self) -> &str {
        soochowlife::PROVIDER_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{ChatMessage, ChatSession, MessageRole, ModelConfig};
    use axum::Router;
    use axum::http::header;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use futures::StreamExt;
    use serde_json::Value;

    fn settings() -> SoochowLifeConfig {
        SoochowLifeConfig {
            chat_path: soochowlife::CHAT_PATH.to_string(),
            ..SoochowLifeConfig::default()
        }
    }

    #[test]
    fn test_resolve_defaults_to_proxy_path() {
        assert_eq!(resolve_base_url(&settings()), api_path::SOOCHOW_LIFE);
    }

    #[test]
    fn test_resolve_app_mode_adds_scheme_and_trims_slash() {
        let mut s = settings();
        s.is_app = true;
        s.base_url = "ai.soochow.example/".to_string();
        assert_eq!(resolve_base_url(&s), "https://ai.soochow.example");
    }

    #[test]
    fn test_resolve_custom_url_only_when_enabled() {
        let mut s = settings();
        s.url = "http://custom.example".to_string();
        assert_eq!(resolve_base_url(&s), api_path::SOOCHOW_LIFE);
        s.use_custom_config = true;
        assert_eq!(resolve_base_url(&s), "http://custom.example");
    }

    #[test]
    fn test_path_joins_proxy_route_onto_gateway_origin() {
        let provider = SoochowLifeProvider::new(
            ChatHttpClient::new().unwrap(),
            settings(),
            RequestConfig::default(),
            None,
            "http://127.0.0.1:8082/".to_string(),
        );
        assert_eq!(
            provider.path("/chat"),
            "http://127.0.0.1:8082/api/soochowLife/chat"
        );
    }

    async fn provider_for(router: Router) -> SoochowLifeProvider {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let mut s = settings();
        s.use_custom_config = true;
        s.url = format!("http://{}", addr);
        SoochowLifeProvider::new(
            ChatHttpClient::new().unwrap(),
            s,
            RequestConfig::default(),
            None,
            String::new(),
        )
    }

    fn options(stream: bool) -> ChatOptions {
        let mut config = ModelConfig::new(soochowlife::MODEL);
        config.stream = stream;
        ChatOptions {
            messages: vec![
                ChatMessage::new(MessageRole::User, "first"),
                ChatMessage::new(MessageRole::User, "latest"),
            ],
            config,
            session: ChatSession::new("user-9"),
        }
    }

    #[tokio::test]
    async fn test_streaming_chat_sends_latest_message() {
        let router = Router::new().route(
            soochowlife::CHAT_PATH,
            post(|axum::Json(body): axum::Json<Value>| async move {
                assert_eq!(body["message"], "latest");
                assert_eq!(body["userId"], "user-9");
                (
                    [(header::CONTENT_TYPE, "text/event-stream")],
                    "data: Dear \n\ndata:customer\n\n",
                )
                    .into_response()
            }),
        );
        let provider = provider_for(router).await;

        let events: Vec<ChatEvent> = provider
            .chat(options(true), CancellationToken::new())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(
            events.last(),
            Some(&ChatEvent::Finish {
                message: "Dear customer".to_string(),
                status: 200
            })
        );
    }

    #[tokio::test]
    async fn test_non_streaming_chat_returns_body_text() {
        let router = Router::new().route(soochowlife::CHAT_PATH, post(|| async { "full reply" }));
        let provider = provider_for(router).await;

        let events: Vec<ChatEvent> = provider
            .chat(options(false), CancellationToken::new())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(
            events,
            vec![ChatEvent::Finish {
                message: "full reply".to_string(),
                status: 200
            }]
        );
    }
}
