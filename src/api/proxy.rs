//! Reverse proxy route
//!
//! `/api/{provider}/{*path}` forwards the method, headers and body of the
//! inbound request to the provider's configured upstream and streams the
//! upstream response back unchanged apart from a few headers.

use crate::api::endpoints::{AppState, access_code};
use axum::{
    Json,
    body::{Body, to_bytes},
    extract::{OriginalUri, Path, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use reqwest::redirect::Policy;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Largest inbound body the proxy buffers
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Inbound request headers never forwarded upstream
const SKIP_REQUEST_HEADERS: &[&str] = &[
    "connection",
    "host",
    "origin",
    "referer",
    "content-length",
    "accept-encoding",
];

/// Upstream response headers never returned to the caller
const SKIP_RESPONSE_HEADERS: &[&str] = &[
    "www-authenticate",
    "content-encoding",
    "content-length",
    "transfer-encoding",
    "connection",
];

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Failed to read request body: {0}")]
    Body(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Upstream did not respond within {0} seconds")]
    Timeout(u64),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match self {
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProxyError::UnknownProvider(_) => StatusCode::NOT_FOUND,
            ProxyError::Body(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        };
        let body = json!({
            "error": true,
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Client used for proxied calls; redirects are handed back to the caller
pub fn build_proxy_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().redirect(Policy::none()).build()
}

/// Join the upstream base, the path after `/api/{provider}/` and the query
pub fn upstream_url(base_url: &str, path: &str, query: Option<&str>) -> String {
    let mut url = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Path after `/api/{provider}/`, still percent-encoded as received
pub fn raw_proxy_path(uri_path: &str) -> &str {
    let mut segments = uri_path.trim_start_matches('/').splitn(3, '/');
    segments.next();
    segments.next();
    segments.next().unwrap_or("")
}

/// Drop browser, gateway and hop-by-hop headers from the inbound request
pub fn forward_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let key = name.as_str();
        if key.contains("x-") || key.contains("sec-") || SKIP_REQUEST_HEADERS.contains(&key) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

/// Copy upstream response headers, disabling proxy buffering
pub fn forward_response_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len() + 1);
    for (name, value) in headers {
        if SKIP_RESPONSE_HEADERS.contains(&name.as_str()) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded.insert("x-accel-buffering", HeaderValue::from_static("no"));
    forwarded
}

/// GET/POST/OPTIONS /api/{provider}/{*path}
pub async fn proxy(
    State(state): State<AppState>,
    Path((provider, _)): Path<(String, String)>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ProxyError> {
    // The decoded wildcard would turn %3F or %23 into a real query or fragment
    let path = raw_proxy_path(uri.path());
    info!("[{} Route] {} /{}", provider, method, path);

    if method == Method::OPTIONS {
        return Ok((StatusCode::OK, Json(json!({ "body": "OK" }))).into_response());
    }

    if !state.config.validate_access_code(access_code(&headers)) {
        warn!("Invalid access code on proxy route for {}", provider);
        return Err(ProxyError::Unauthorized);
    }

    let base_url = state
        .config
        .upstream_for(&provider)
        .ok_or_else(|| ProxyError::UnknownProvider(provider.clone()))?;
    let url = upstream_url(base_url, path, uri.query());
    debug!("Proxying {} {}", method, url);

    let mut request = state
        .proxy_client
        .request(method.clone(), &url)
        .headers(forward_request_headers(&headers));
    if method != Method::GET && method != Method::HEAD {
        let bytes = to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|e| ProxyError::Body(e.to_string()))?;
        request = request.body(bytes);
    }

    let timeout_secs = state.config.proxy.timeout_secs;
    let upstream = match tokio::time::timeout(Duration::from_secs(timeout_secs), request.send()).await
    {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            error!("Proxy request to {} failed: {}", url, e);
            return Err(ProxyError::Upstream(e.to_string()));
        }
        Err(_) => {
            error!("Proxy request to {} timed out", url);
            return Err(ProxyError::Timeout(timeout_secs));
        }
    };

    let status = upstream.status();
    let response_headers = forward_response_headers(upstream.headers());
    debug!("Upstream {} answered {}", url, status);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}
