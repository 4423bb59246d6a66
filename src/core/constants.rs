//! Constants for vendor endpoints, proxy paths and stream markers

/// Tencent LKE bot defaults
pub mod tencent {
    pub const ENDPOINT: &str = "https://wss.lke.cloud.tencent.com";
    pub const CHAT_PATH: &str = "/v1/qbot/chat/sse";
    pub const MODEL: &str = "tencent-bot";
    pub const PROVIDER_ID: &str = "tencent";
    pub const PROVIDER_NAME: &str = "Tencent";
}

/// SoochowLife defaults
pub mod soochowlife {
    pub const CHAT_PATH: &str = "/chat";
    pub const MODEL: &str = "soochowLife";
    pub const PROVIDER_ID: &str = "soochowLife";
    pub const PROVIDER_NAME: &str = "SoochowLife";
}

/// Gateway-relative proxy prefixes
pub mod api_path {
    pub const SOOCHOW_LIFE: &str = "/api/soochowLife";
}

/// Markers inside vendor event streams
pub mod stream {
    pub const DONE: &str = "[DONE]";
    pub const THINK_OPEN: &str = "<think>";
    pub const THINK_CLOSE: &str = "</think>";
    pub const EVENT_STREAM: &str = "text/event-stream";
    pub const TEXT_PLAIN: &str = "text/plain";
}

/// Request timeouts in milliseconds
pub mod timeout {
    pub const REQUEST_MS: u64 = 60_000;
    pub const THINKING_REQUEST_MS: u64 = REQUEST_MS * 5;
    pub const PROXY_SECS: u64 = 600;
}

/// Header carrying the gateway access code
pub const ACCESS_CODE_HEADER: &str = "x-access-code";
