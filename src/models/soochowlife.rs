//! SoochowLife API data models

use crate::models::chat::MessageContent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoochowLifeRequestPayload {
    pub message: MessageContent,
    #[serde(rename = "userId")]
    pub user_id: String,
}
