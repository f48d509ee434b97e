use crate::protocol::canonical::{CanonicalRequest, CanonicalUsage};
use std::time::Duration;
use tracing::info;

/// Estimate the number of tokens in `text`.
///
/// Uses a lightweight heuristic (`bytes / 4`) to avoid loading model BPE tables.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(4)
}

/// Length-based usage units for one streamed delta: its character count.
#[must_use]
pub fn count_delta_units(delta: &str) -> u64 {
    delta.chars().count() as u64
}

/// Estimate the prompt tokens of a canonical request from its message text.
#[must_use]
pub fn estimate_request_tokens(request: &CanonicalRequest) -> u64 {
    request
        .messages
        .iter()
        .map(|msg| estimate_tokens(&msg.content))
        .sum()
}

/// Log token usage for a finished session at INFO level.
pub fn log_request_usage(
    model: &str,
    backend: &str,
    usage: &CanonicalUsage,
    chunks: u64,
    duration: Duration,
) {
    info!(
        model = model,
        backend = backend,
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        chunks = chunks,
        duration_seconds = duration.as_secs_f64(),
        "request completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::canonical::{CanonicalMessage, CanonicalRole};

    #[test]
    fn test_estimate_tokens_nonempty() {
        assert_eq!(estimate_tokens("Hello, world!"), 4);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_delta_units_count_characters() {
        assert_eq!(count_delta_units("llo"), 3);
        assert_eq!(count_delta_units("caf\u{e9}"), 4);
        assert_eq!(count_delta_units(""), 0);
    }

    #[test]
    fn test_estimate_request_tokens_sums_messages() {
        let request = CanonicalRequest {
            request_id: uuid::Uuid::nil(),
            model: "gpt-4".into(),
            messages: vec![
                CanonicalMessage::new(CanonicalRole::System, "abcd"),
                CanonicalMessage::new(CanonicalRole::User, "abcde"),
            ],
            stream: false,
            max_tokens: None,
            temperature: None,
            stop: None,
        };
        assert_eq!(estimate_request_tokens(&request), 3);
    }
}
