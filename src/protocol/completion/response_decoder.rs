use crate::error::CanonicalError;

use super::CompletionResponse;

/// Parse a single-shot completion API response body.
///
/// # Errors
///
/// Returns [`CanonicalError::UpstreamProtocol`] when the body is not a
/// completion object.
pub fn decode_completion_response(body: &[u8]) -> Result<CompletionResponse, CanonicalError> {
    serde_json::from_slice(body).map_err(|e| {
        CanonicalError::UpstreamProtocol(format!("Invalid completion response body: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_completion_response() {
        let resp = decode_completion_response(
            br#"{"completion":" Hello!","stop_reason":"stop_sequence","model":"claude-v1.3"}"#,
        )
        .unwrap();
        assert_eq!(resp.completion, " Hello!");
        assert_eq!(resp.stop_reason.as_deref(), Some("stop_sequence"));
    }

    #[test]
    fn test_missing_stop_reason_is_none() {
        let resp = decode_completion_response(br#"{"completion":"x"}"#).unwrap();
        assert!(resp.stop_reason.is_none());
    }

    #[test]
    fn test_invalid_body_is_protocol_error() {
        let err = decode_completion_response(b"<html>").unwrap_err();
        assert!(matches!(err, CanonicalError::UpstreamProtocol(_)));
    }
}
