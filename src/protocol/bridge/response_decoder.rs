use crate::error::CanonicalError;

use super::BridgeEvent;

const DONE_SENTINEL: &str = "[DONE]";

/// A decoded line of the bridge stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeLine {
    /// Full text generated so far.
    Snapshot(String),
    Done,
}

/// Decode one line of the bridge stream.
///
/// Returns `None` for lines that carry no event (blank lines, comments,
/// `event:` fields).
///
/// # Errors
///
/// Returns [`CanonicalError::UpstreamProtocol`] when a `data:` payload is not
/// a well-formed bridge event.
pub fn decode_bridge_line(line: &str) -> Option<Result<BridgeLine, CanonicalError>> {
    let payload = line
        .strip_prefix("data:")
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))?
        .trim_end_matches(['\r', '\n']);
    if payload.trim() == DONE_SENTINEL {
        return Some(Ok(BridgeLine::Done));
    }
    if payload.trim().is_empty() {
        return None;
    }
    Some(decode_bridge_payload(payload))
}

fn decode_bridge_payload(payload: &str) -> Result<BridgeLine, CanonicalError> {
    let event: BridgeEvent = serde_json::from_str(payload).map_err(|e| {
        CanonicalError::UpstreamProtocol(format!("Invalid bridge event payload: {e}"))
    })?;
    event
        .message
        .content
        .parts
        .into_iter()
        .next()
        .map(BridgeLine::Snapshot)
        .ok_or_else(|| {
            CanonicalError::UpstreamProtocol("Bridge event has no content parts".to_string())
        })
}
