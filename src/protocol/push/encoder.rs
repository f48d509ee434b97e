use crate::protocol::canonical::CanonicalRequest;

use super::PushRequest;

/// Encode a canonical request for the push API: the final message only,
/// addressed to the configured bot.
#[must_use]
pub fn encode_push_request(canonical: &CanonicalRequest, bot: &str) -> PushRequest {
    PushRequest {
        bot: bot.to_string(),
        prompt: canonical
            .last_message_content()
            .unwrap_or_default()
            .to_string(),
        with_chat_break: false,
    }
}
