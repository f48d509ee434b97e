use serde_json::Value;

use crate::error::CanonicalError;
use crate::protocol::canonical::{CanonicalMessage, CanonicalRequest};
use crate::protocol::mapping::openai_role_to_canonical;

use super::{OpenAiChatRequest, OpenAiMessage, OpenAiStop};

/// Parse a raw request body into the wire type.
///
/// # Errors
///
/// Returns [`CanonicalError::InvalidRequest`] when the body is not valid JSON
/// or has the wrong shape.
pub fn parse_openai_chat_request_wire(body: &[u8]) -> Result<OpenAiChatRequest, CanonicalError> {
    serde_json::from_slice(body).map_err(|e| {
        CanonicalError::InvalidRequest(format!("Invalid OpenAI Chat request body: {e}"))
    })
}

/// Decode an `OpenAI` Chat Completions wire request into the canonical request.
///
/// Consumes the wire type so message bodies move without cloning.
///
/// # Errors
///
/// Returns [`CanonicalError::InvalidRequest`] when `model` or `messages` is
/// missing, `messages` is empty, or a message has an unsupported role or
/// content shape.
pub fn decode_openai_chat_request(
    request: OpenAiChatRequest,
    request_id: uuid::Uuid,
) -> Result<CanonicalRequest, CanonicalError> {
    let OpenAiChatRequest {
        model,
        messages,
        stream,
        temperature,
        max_tokens,
        stop,
        extra: _,
    } = request;

    let model = match model {
        Some(model) if !model.trim().is_empty() => model,
        _ => {
            return Err(CanonicalError::InvalidRequest(
                "'model' is required".to_string(),
            ))
        }
    };
    let messages = match messages {
        Some(messages) if !messages.is_empty() => messages,
        Some(_) => {
            return Err(CanonicalError::InvalidRequest(
                "'messages' must contain at least one message".to_string(),
            ))
        }
        None => {
            return Err(CanonicalError::InvalidRequest(
                "'messages' is required".to_string(),
            ))
        }
    };

    let messages = messages
        .into_iter()
        .enumerate()
        .map(|(index, message)| decode_message(index, message))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CanonicalRequest {
        request_id,
        model,
        messages,
        stream: stream.unwrap_or(false),
        max_tokens,
        temperature,
        stop: decode_stop(stop),
    })
}

fn decode_message(index: usize, message: OpenAiMessage) -> Result<CanonicalMessage, CanonicalError> {
    let role = openai_role_to_canonical(&message.role).ok_or_else(|| {
        CanonicalError::InvalidRequest(format!(
            "messages[{index}].role '{}' is not supported",
            message.role
        ))
    })?;
    let content = extract_text_content(index, message.content)?;
    Ok(CanonicalMessage::new(role, content))
}

fn extract_text_content(index: usize, content: Option<Value>) -> Result<String, CanonicalError> {
    match content {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text),
        Some(Value::Array(parts)) => {
            let mut text = String::new();
            for part in parts {
                match part.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(fragment) = part.get("text").and_then(Value::as_str) {
                            text.push_str(fragment);
                        }
                    }
                    Some(other) => {
                        return Err(CanonicalError::InvalidRequest(format!(
                            "messages[{index}]: content part type '{other}' is not supported"
                        )))
                    }
                    None => {
                        return Err(CanonicalError::InvalidRequest(format!(
                            "messages[{index}]: content part is missing 'type'"
                        )))
                    }
                }
            }
            Ok(text)
        }
        Some(_) => Err(CanonicalError::InvalidRequest(format!(
            "messages[{index}].content must be a string or an array of parts"
        ))),
    }
}

fn decode_stop(stop: Option<OpenAiStop>) -> Option<Vec<String>> {
    let stop = match stop? {
        OpenAiStop::Single(s) => vec![s],
        OpenAiStop::Multi(v) => v,
    };
    let stop: Vec<String> = stop.into_iter().filter(|s| !s.is_empty()).collect();
    (!stop.is_empty()).then_some(stop)
}
