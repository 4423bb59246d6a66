//! API endpoint handlers
//!
//! This module implements the HTTP surface of the gateway: chat through a
//! vendor client, model and usage listings, health checks, and the
//! reverse-proxy route.

use crate::api::proxy::{self, build_proxy_client};
use crate::conversion::request_converter::truncate_history;
use crate::core::config::Config;
use crate::core::constants::ACCESS_CODE_HEADER;
use crate::core::model_manager::ModelManager;
use crate::core::provider::{ChatEventStream, ProviderError, ProviderType};
use crate::models::chat::{ChatEvent, ChatMessage, ChatOptions, ChatSession, ModelConfig, SpeechOptions};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{
        IntoResponse, Response, Sse,
        sse::{Event, KeepAlive},
    },
    routing::{get, post},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub model_manager: Arc<ModelManager>,
    pub proxy_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config, model_manager: ModelManager) -> anyhow::Result<Self> {
        Ok(Self {
            config: Arc::new(config),
            model_manager: Arc::new(model_manager),
            proxy_client: build_proxy_client()?,
        })
    }
}

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/v1/chat", post(chat))
        .route("/v1/models", get(list_models))
        .route("/v1/usage/{provider}", get(usage))
        .route("/v1/speech/{provider}", post(speech))
        .route(
            "/api/{provider}/{*path}",
            get(proxy::proxy).post(proxy::proxy).options(proxy::proxy),
        )
        .with_state(state)
}

/// Access code presented by the caller
pub fn access_code(headers: &HeaderMap) -> Option<&str> {
    headers.get(ACCESS_CODE_HEADER).and_then(|v| v.to_str().ok())
}

fn validate_access(headers: &HeaderMap, config: &Config) -> Result<(), StatusCode> {
    if config.validate_access_code(access_code(headers)) {
        Ok(())
    } else {
        warn!("Invalid access code provided by client");
        Err(StatusCode::UNAUTHORIZED)
    }
}

fn provider_error_response(e: &ProviderError) -> Response {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = json!({
        "type": "error",
        "error": {
            "type": e.kind(),
            "message": e.to_string()
        }
    });
    (status, Json(body)).into_response()
}

/// Body of POST /v1/chat
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub config: ModelConfig,
    #[serde(default)]
    pub session: Option<ChatSession>,
    #[serde(default)]
    pub provider: Option<String>,
}

/// Non-streaming chat result
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct ChatReply {
    pub message: String,
    pub topic: Option<String>,
    pub errors: Vec<String>,
    pub status: u16,
}

/// Drain a chat event stream into a single reply
pub async fn collect_reply(mut events: ChatEventStream) -> ChatReply {
    let mut reply = ChatReply::default();
    while let Some(event) = events.next().await {
        match event {
            ChatEvent::Update { text, .. } => reply.message = text,
            ChatEvent::Topic { topic } => reply.topic = Some(topic),
            ChatEvent::Error { message } => reply.errors.push(message),
            ChatEvent::Finish { message, status } => {
                reply.message = message;
                reply.status = status;
            }
        }
    }
    reply
}

fn to_sse_event(event: &ChatEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

/// POST /v1/chat - Run a chat through the selected vendor
async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, StatusCode> {
    validate_access(&headers, &state.config)?;

    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Malformed chat request: {}", e);
            let error = ProviderError::BadRequest(format!("Invalid chat request: {}", e));
            return Ok(provider_error_response(&error));
        }
    };

    let config = request.config.validated();
    let (provider, client) = match state
        .model_manager
        .resolve(request.provider.as_deref(), &config)
    {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!("Rejected chat request: {}", e);
            return Ok(provider_error_response(&e));
        }
    };

    info!(
        "📥 Incoming chat request: provider={}, model={}, stream={}, messages={}",
        provider,
        config.model,
        config.stream,
        request.messages.len()
    );

    let messages = truncate_history(request.messages, config.history_message_count);
    let session = request.session.unwrap_or_else(ChatSession::fresh);
    let stream = config.stream;
    debug!("Chat session {} with {} messages after truncation", session.id, messages.len());

    let options = ChatOptions {
        messages,
        config,
        session,
    };

    // Dropping the guard (client gone, or reply drained) aborts the upstream call
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let events = match client.chat(options, cancel).await {
        Ok(events) => events,
        Err(e) => {
            error!("Provider {} chat error: {}", provider, e);
            return Ok(provider_error_response(&e));
        }
    };

    if !stream {
        let reply = collect_reply(events).await;
        drop(guard);
        return Ok(Json(reply).into_response());
    }

    let sse_stream = async_stream::stream! {
        let _guard = guard;
        let mut events = events;
        while let Some(event) = events.next().await {
            if let ChatEvent::Error { message } = &event {
                error!("Stream error: {}", message);
            }
            yield Ok::<_, Infallible>(to_sse_event(&event));
        }
    };

    let mut response = Sse::new(sse_stream)
        .keep_alive(KeepAlive::default())
        .into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response_headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    Ok(response)
}

/// GET /v1/models - Models of every configured vendor
async fn list_models(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    validate_access(&headers, &state.config)?;
    let models = state.model_manager.all_models().await;
    Ok(Json(models).into_response())
}

fn lookup_client(
    state: &AppState,
    provider: &str,
) -> Result<Arc<dyn crate::core::provider::LlmApi>, ProviderError> {
    ProviderType::from_str(provider)
        .and_then(|p| state.model_manager.get(p))
        .ok_or_else(|| ProviderError::BadRequest(format!("Provider {} is not configured", provider)))
}

/// GET /v1/usage/{provider}
async fn usage(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    validate_access(&headers, &state.config)?;
    let result = match lookup_client(&state, &provider) {
        Ok(client) => client.usage().await,
        Err(e) => Err(e),
    };
    Ok(match result {
        Ok(usage) => Json(usage).into_response(),
        Err(e) => provider_error_response(&e),
    })
}

/// POST /v1/speech/{provider}
async fn speech(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    Json(options): Json<SpeechOptions>,
) -> Result<Response, StatusCode> {
    validate_access(&headers, &state.config)?;
    let result = match lookup_client(&state, &provider) {
        Ok(client) => client.speech(options).await,
        Err(e) => Err(e),
    };
    Ok(match result {
        Ok(audio) => ([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response(),
        Err(e) => {
            debug!("Speech request for {} failed: {}", provider, e);
            provider_error_response(&e)
        }
    })
}

/// GET / - Root endpoint
async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let providers: Vec<String> = state
        .model_manager
        .providers()
        .iter()
        .map(|p| p.id().to_string())
        .collect();
    let upstreams: Vec<&String> = state.config.proxy.upstreams.keys().collect();

    Json(json!({
        "message": format!("Chat Gateway v{}", env!("CARGO_PKG_VERSION")),
        "status": "running",
        "config": {
            "providers": providers,
            "default_provider": state.config.default_provider().map(|p| p.id()),
            "proxy_upstreams": upstreams,
            "access_code_required": state.config.access.code.is_some(),
        },
        "endpoints": {
            "chat": "/v1/chat",
            "models": "/v1/models",
            "usage": "/v1/usage/{provider}",
            "speech": "/v1/speech/{provider}",
            "proxy": "/api/{provider}/{*path}",
            "health": "/health",
        },
    }))
}

/// GET /health - Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "providers_configured": state.model_manager.providers().len(),
        "proxy_upstreams": state.config.proxy.upstreams.len(),
    }))
}
