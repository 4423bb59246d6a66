//! Shared HTTP plumbing for vendor clients
//!
//! Wraps a `reqwest::Client` with the request timeout and cancellation
//! rules every vendor follows, and turns SSE responses into chat events.

use crate::conversion::response_converter::{
    ParsedItem, SseChunkParser, SseDecoder, ThinkingAssembler,
};
use crate::core::constants::{ACCESS_CODE_HEADER, stream};
use crate::core::provider::{ChatEventStream, ProviderError};
use crate::models::chat::ChatEvent;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Headers sent with every vendor chat request
pub fn default_headers(access_code: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Some(code) = access_code {
        match HeaderValue::from_str(code) {
            Ok(value) => {
                headers.insert(ACCESS_CODE_HEADER, value);
            }
            Err(_) => warn!("Access code contains characters not allowed in a header"),
        }
    }
    headers
}

/// HTTP client shared by all vendor adapters
#[derive(Clone)]
pub struct ChatHttpClient {
    client: Client,
}

impl ChatHttpClient {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Unexpected(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// POST `body` as JSON.
    ///
    /// `timeout_ms` bounds the wait for response headers; when it fires the
    /// token is cancelled as well. Reading the body is bounded only by the
    /// token.
    pub async fn send<B>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &B,
        timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Result<Response, ProviderError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let request = self.client.post(url).headers(headers).json(body);

        tokio::select! {
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = tokio::time::timeout(Duration::from_millis(timeout_ms), request.send()) => {
                match result {
                    Ok(response) => response.map_err(ProviderError::from),
                    Err(_) => {
                        warn!("Request to {} timed out after {} ms", url, timeout_ms);
                        cancel.cancel();
                        Err(ProviderError::Timeout(timeout_ms))
                    }
                }
            }
        }
    }

    /// Non-streaming request; non-2xx statuses become errors
    pub async fn post_json<B>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &B,
        timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> Result<Response, ProviderError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let response = self.send(url, headers, body, timeout_ms, cancel).await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }
        Ok(response)
    }

    /// Open a vendor SSE stream and decode it into chat events.
    ///
    /// Every data payload goes through `parser`; its content chunks are
    /// folded by a `ThinkingAssembler`. The stream always ends with a
    /// `Finish` carrying the assembled text, including when `cancel` fires.
    pub async fn stream_with_think<B, P>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &B,
        mut parser: P,
        timeout_ms: u64,
        cancel: CancellationToken,
    ) -> Result<ChatEventStream, ProviderError>
    where
        B: Serialize + ?Sized + Sync,
        P: SseChunkParser + 'static,
    {
        let mut headers = headers;
        headers.insert(ACCEPT, HeaderValue::from_static(stream::EVENT_STREAM));

        let response = self.send(url, headers, body, timeout_ms, &cancel).await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        debug!("Stream opened: status={}, content-type={}", status, content_type);

        let events = async_stream::stream! {
            if status.is_success() && content_type.starts_with(stream::TEXT_PLAIN) {
                let message = match response.text().await {
                    Ok(text) => text,
                    Err(e) => {
                        yield ChatEvent::Error { message: e.to_string() };
                        String::new()
                    }
                };
                yield ChatEvent::Finish { message, status: status.as_u16() };
                return;
            }

            if !status.is_success() || !content_type.starts_with(stream::EVENT_STREAM) {
                let body = response.text().await.unwrap_or_default();
                let message = open_failure_message(status, &body);
                error!("Stream open failed: {}", message);
                yield ChatEvent::Error { message: message.clone() };
                yield ChatEvent::Finish { message, status: status.as_u16() };
                return;
            }

            let byte_stream = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
            let reader = tokio::io::BufReader::new(tokio_util::io::StreamReader::new(byte_stream));
            let mut lines = LinesStream::new(reader.lines());

            let mut decoder = SseDecoder::new();
            let mut assembler = ThinkingAssembler::new();

            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Chat stream cancelled");
                        break;
                    }
                    line = lines.next() => line,
                };

                let (data, ended) = match next {
                    Some(Ok(line)) => match decoder.push_line(&line) {
                        Some(data) => (data, false),
                        None => continue,
                    },
                    Some(Err(e)) => {
                        error!("Stream error: {}", e);
                        yield ChatEvent::Error { message: format!("Stream error: {}", e) };
                        break;
                    }
                    None => match decoder.flush() {
                        Some(data) => (data, true),
                        None => break,
                    },
                };

                let trimmed = data.trim();
                if trimmed == stream::DONE {
                    break;
                }
                if !trimmed.is_empty() {
                    for item in parser.parse(&data) {
                        match item {
                            ParsedItem::Content(chunk) => {
                                if let Some(delta) = assembler.push(chunk) {
                                    yield ChatEvent::Update {
                                        text: assembler.text().to_string(),
                                        delta,
                                    };
                                }
                            }
                            ParsedItem::Topic(topic) => yield ChatEvent::Topic { topic },
                            ParsedItem::Error(message) => yield ChatEvent::Error { message },
                        }
                    }
                }

                if ended {
                    break;
                }
            }

            yield ChatEvent::Finish {
                message: assembler.into_text(),
                status: status.as_u16(),
            };
        };

        Ok(Box::pin(events))
    }
}

fn open_failure_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    let mut parts = Vec::with_capacity(2);
    if status == StatusCode::UNAUTHORIZED {
        parts.push("Unauthorized: check the access code or vendor API key".to_string());
    }
    if !body.is_empty() {
        parts.push(body.to_string());
    }
    if parts.is_empty() {
        parts.push(format!("Upstream responded with status {}", status.as_u16()));
    }
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::response_converter::ThinkChunk;
    use axum::Router;
    use axum::http::header;
    use axum::response::IntoResponse;
    use axum::routing::post;

    struct EchoParser;

    impl SseChunkParser for EchoParser {
        fn parse(&mut self, data: &str) -> Vec<ParsedItem> {
            vec![ParsedItem::Content(ThinkChunk::reply(data))]
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn collect(stream: ChatEventStream) -> Vec<ChatEvent> {
        stream.collect().await
    }

    #[test]
    fn test_default_headers_include_access_code() {
        let headers = default_headers(Some("code-1"));
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get(ACCESS_CODE_HEADER).unwrap(), "code-1");
        assert!(default_headers(None).get(ACCESS_CODE_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_stream_with_think_decodes_events() {
        let router = Router::new().route(
            "/chat",
            post(|| async {
                (
                    [(header::CONTENT_TYPE, "text/event-stream")],
                    "data: Hel\n\ndata: lo\n\ndata: [DONE]\n\ndata: ignored\n\n",
                )
                    .into_response()
            }),
        );
        let base = serve(router).await;
        let client = ChatHttpClient::new().unwrap();

        let stream = client
            .stream_with_think(
                &format!("{}/chat", base),
                default_headers(None),
                &serde_json::json!({}),
                EchoParser,
                5_000,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let events = collect(stream).await;

        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1],
            ChatEvent::Update {
                text: "Hello".into(),
                delta: "lo".into()
            }
        );
        assert_eq!(
            events[2],
            ChatEvent::Finish {
                message: "Hello".into(),
                status: 200
            }
        );
    }

    #[tokio::test]
    async fn test_stream_with_think_plain_text_body_is_final_message() {
        let router = Router::new().route(
            "/chat",
            post(|| async { ([(header::CONTENT_TYPE, "text/plain")], "whole answer").into_response() }),
        );
        let base = serve(router).await;
        let client = ChatHttpClient::new().unwrap();

        let stream = client
            .stream_with_think(
                &format!("{}/chat", base),
                default_headers(None),
                &serde_json::json!({}),
                EchoParser,
                5_000,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let events = collect(stream).await;
        assert_eq!(
            events,
            vec![ChatEvent::Finish {
                message: "whole answer".into(),
                status: 200
            }]
        );
    }

    #[tokio::test]
    async fn test_stream_with_think_reports_unauthorized() {
        let router = Router::new().route(
            "/chat",
            post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "nope").into_response() }),
        );
        let base = serve(router).await;
        let client = ChatHttpClient::new().unwrap();

        let stream = client
            .stream_with_think(
                &format!("{}/chat", base),
                default_headers(None),
                &serde_json::json!({}),
                EchoParser,
                5_000,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let events = collect(stream).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            ChatEvent::Error { message } if message.contains("Unauthorized") && message.ends_with("nope")
        ));
        assert!(matches!(&events[1], ChatEvent::Finish { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_stream_with_think_plain_text_error_is_reported() {
        let router = Router::new().route(
            "/chat",
            post(|| async {
                (
                    axum::http::StatusCode::BAD_GATEWAY,
                    [(header::CONTENT_TYPE, "text/plain")],
                    "vendor down",
                )
                    .into_response()
            }),
        );
        let base = serve(router).await;
        let client = ChatHttpClient::new().unwrap();

        let stream = client
            .stream_with_think(
                &format!("{}/chat", base),
                default_headers(None),
                &serde_json::json!({}),
                EchoParser,
                5_000,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let events = collect(stream).await;
        assert_eq!(
            events,
            vec![
                ChatEvent::Error {
                    message: "vendor down".into()
                },
                ChatEvent::Finish {
                    message: "vendor down".into(),
                    status: 502
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_finishes_with_text_so_far() {
        let router = Router::new().route(
            "/chat",
            post(|| async {
                let body = async_stream::stream! {
                    yield Ok::<_, std::convert::Infallible>("data: part\n\n");
                    futures::future::pending::<()>().await;
                };
                (
                    [(header::CONTENT_TYPE, "text/event-stream")],
                    axum::body::Body::from_stream(body),
                )
                    .into_response()
            }),
        );
        let base = serve(router).await;
        let client = ChatHttpClient::new().unwrap();
        let cancel = CancellationToken::new();

        let mut stream = client
            .stream_with_think(
                &format!("{}/chat", base),
                default_headers(None),
                &serde_json::json!({}),
                EchoParser,
                5_000,
                cancel.clone(),
            )
            .await
            .unwrap();

        assert_eq!(
            stream.next().await,
            Some(ChatEvent::Update {
                text: "part".into(),
                delta: "part".into()
            })
        );
        cancel.cancel();

        let rest = tokio::time::timeout(Duration::from_secs(5), collect(stream))
            .await
            .unwrap();
        assert_eq!(
            rest,
            vec![ChatEvent::Finish {
                message: "part".into(),
                status: 200
            }]
        );
    }

    #[tokio::test]
    async fn test_send_times_out_and_cancels_token() {
        let router = Router::new().route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let base = serve(router).await;
        let client = ChatHttpClient::new().unwrap();
        let cancel = CancellationToken::new();

        let result = client
            .send(
                &format!("{}/slow", base),
                default_headers(None),
                &serde_json::json!({}),
                50,
                &cancel,
            )
            .await;
        assert!(matches!(result, Err(ProviderError::Timeout(50))));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_post_json_maps_error_status() {
        let router = Router::new().route(
            "/chat",
            post(|| async { (axum::http::StatusCode::TOO_MANY_REQUESTS, "slow down").into_response() }),
        );
        let base = serve(router).await;
        let client = ChatHttpClient::new().unwrap();

        let result = client
            .post_json(
                &format!("{}/chat", base),
                default_headers(None),
                &serde_json::json!({}),
                5_000,
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(ProviderError::RateLimit(msg)) if msg == "slow down"));
    }
}
