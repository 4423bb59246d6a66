//! Tencent LKE bot API data models

use serde::{Deserialize, Serialize};

/// Chat request sent to the LKE SSE endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TencentRequestPayload {
    pub request_id: String,
    /// JSON-encoded `[{role, content}]` list
    pub content: String,
    pub session_id: String,
    pub bot_app_key: String,
    pub visitor_biz_id: String,
    pub system_role: String,
    pub streaming_throttle: u32,
}

/// Frame kinds of the LKE event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TencentFrameType {
    Reply,
    Thought,
    Error,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TencentDebugging {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TencentProcedure {
    #[serde(default)]
    pub debugging: TencentDebugging,
}

/// Payload of a `reply` or `thought` frame, trimmed to the fields we read
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TencentReplyPayload {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub from_name: String,
    #[serde(default)]
    pub is_from_self: bool,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub record_id: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub procedures: Vec<TencentProcedure>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TencentErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

/// One decoded SSE data frame
#[derive(Debug, Clone, Deserialize)]
pub struct TencentResponseFrame {
    #[serde(rename = "type")]
    pub frame_type: TencentFrameType,
    #[serde(default)]
    pub payload: Option<TencentReplyPayload>,
    #[serde(default)]
    pub error: Option<TencentErrorBody>,
}
