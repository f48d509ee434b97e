pub mod encoder;
pub mod response_decoder;

use serde::{Deserialize, Serialize};

/// Conversation request accepted by the cumulative SSE bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeRequest {
    pub action: String,
    pub messages: Vec<BridgeMessage>,
    pub parent_message_id: uuid::Uuid,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub id: uuid::Uuid,
    pub role: String,
    pub author: BridgeAuthor,
    pub content: BridgeContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeAuthor {
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeContent {
    pub content_type: String,
    pub parts: Vec<String>,
}

/// One `data:` event of the bridge stream.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeEvent {
    pub message: BridgeEventMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeEventMessage {
    pub content: BridgeEventContent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeEventContent {
    #[serde(default)]
    pub parts: Vec<String>,
}
