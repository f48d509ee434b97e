use crate::protocol::canonical::CanonicalRequest;
use crate::protocol::mapping::ModelMap;
use crate::util::random_uuid;

use super::{BridgeAuthor, BridgeContent, BridgeMessage, BridgeRequest};

/// Encode a canonical request for the cumulative SSE bridge.
///
/// Only the final message is sent; earlier history and sampling parameters
/// have no representation in this protocol.
#[must_use]
pub fn encode_bridge_request(canonical: &CanonicalRequest, models: &ModelMap) -> BridgeRequest {
    let prompt = canonical.last_message_content().unwrap_or_default();
    BridgeRequest {
        action: "next".to_string(),
        messages: vec![BridgeMessage {
            id: random_uuid(),
            role: "user".to_string(),
            author: BridgeAuthor {
                role: "user".to_string(),
            },
            content: BridgeContent {
                content_type: "text".to_string(),
                parts: vec![prompt.to_string()],
            },
        }],
        parent_message_id: random_uuid(),
        model: models.resolve(&canonical.model).to_string(),
    }
}
