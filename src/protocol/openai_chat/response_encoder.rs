use crate::protocol::canonical::{CanonicalChunk, CanonicalCompletion};
use crate::util::{push_json_string_escaped, push_u64_decimal};

use super::{OpenAiChatResponse, OpenAiChoice, OpenAiResponseMessage, OpenAiUsage};

/// Encode one canonical chunk as a complete `data: ...\n\n` SSE frame.
///
/// Non-terminal chunks always carry `delta.content`. A terminal chunk with no
/// text carries an empty `delta` object.
#[must_use]
pub fn encode_openai_chunk_frame(chunk: &CanonicalChunk) -> String {
    let mut out =
        String::with_capacity(192 + chunk.id.len() + chunk.model.len() + chunk.delta_text.len());
    out.push_str("data: {\"id\":");
    push_json_string_escaped(&mut out, &chunk.id);
    out.push_str(",\"object\":\"chat.completion.chunk\",\"created\":");
    push_u64_decimal(&mut out, chunk.created_at);
    out.push_str(",\"model\":");
    push_json_string_escaped(&mut out, &chunk.model);
    out.push_str(",\"usage\":{\"prompt_tokens\":0,\"completion_tokens\":");
    push_u64_decimal(&mut out, chunk.usage.completion_tokens);
    out.push_str(",\"total_tokens\":");
    push_u64_decimal(&mut out, chunk.usage.total_tokens);
    out.push_str("},\"choices\":[{\"delta\":");
    if chunk.is_terminal() && chunk.delta_text.is_empty() {
        out.push_str("{}");
    } else {
        out.push_str("{\"role\":\"assistant\",\"content\":");
        push_json_string_escaped(&mut out, &chunk.delta_text);
        out.push('}');
    }
    out.push_str(",\"index\":0,\"finish_reason\":");
    match chunk.finish_reason {
        Some(reason) => push_json_string_escaped(&mut out, reason.as_str()),
        None => out.push_str("null"),
    }
    out.push_str("}]}\n\n");
    out
}

/// Encode a finished completion into the non-streaming wire response.
#[must_use]
pub fn encode_openai_chat_response(completion: &CanonicalCompletion) -> OpenAiChatResponse {
    OpenAiChatResponse {
        id: completion.id.to_string(),
        object: "chat.completion".to_string(),
        created: completion.created_at,
        model: completion.model.to_string(),
        usage: OpenAiUsage {
            prompt_tokens: completion.usage.prompt_tokens,
            completion_tokens: completion.usage.completion_tokens,
            total_tokens: completion.usage.total_tokens,
        },
        choices: vec![OpenAiChoice {
            message: OpenAiResponseMessage {
                role: "assistant".to_string(),
                content: completion.content.clone(),
            },
            index: 0,
            finish_reason: Some(completion.finish_reason.as_str().to_string()),
        }],
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::protocol::canonical::{CanonicalUsage, ChunkUsage, FinishReason};

    fn chunk(text: &str, finish_reason: Option<FinishReason>) -> CanonicalChunk {
        CanonicalChunk {
            id: Arc::from("chatcmpl-0000000000000001"),
            created_at: 1_700_000_000,
            model: Arc::from("gpt-4"),
            delta_text: text.to_string(),
            finish_reason,
            usage: ChunkUsage {
                completion_tokens: 3,
                total_tokens: 3,
            },
        }
    }

    fn frame_json(frame: &str) -> serde_json::Value {
        let payload = frame
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .expect("sse frame");
        serde_json::from_str(payload).expect("chunk json")
    }

    #[test]
    fn test_content_chunk_frame() {
        let json = frame_json(&encode_openai_chunk_frame(&chunk("llo \"x\"", None)));
        assert_eq!(json["object"], "chat.completion.chunk");
        assert_eq!(json["id"], "chatcmpl-0000000000000001");
        assert_eq!(json["created"], 1_700_000_000);
        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["usage"]["prompt_tokens"], 0);
        assert_eq!(json["usage"]["completion_tokens"], 3);
        assert_eq!(json["choices"][0]["delta"]["role"], "assistant");
        assert_eq!(json["choices"][0]["delta"]["content"], "llo \"x\"");
        assert_eq!(json["choices"][0]["index"], 0);
        assert!(json["choices"][0]["finish_reason"].is_null());
    }

    #[test]
    fn test_empty_terminal_chunk_has_empty_delta() {
        let json = frame_json(&encode_openai_chunk_frame(&chunk("", Some(FinishReason::Done))));
        assert_eq!(json["choices"][0]["delta"], serde_json::json!({}));
        assert_eq!(json["choices"][0]["finish_reason"], "done");
    }

    #[test]
    fn test_terminal_chunk_with_text_keeps_content() {
        let json = frame_json(&encode_openai_chunk_frame(&chunk(
            "all of it",
            Some(FinishReason::Length),
        )));
        assert_eq!(json["choices"][0]["delta"]["content"], "all of it");
        assert_eq!(json["choices"][0]["finish_reason"], "length");
    }

    #[test]
    fn test_completion_response_shape() {
        let completion = CanonicalCompletion {
            id: Arc::from("chatcmpl-1"),
            created_at: 1,
            model: Arc::from("gpt-4"),
            content: "Hello".to_string(),
            finish_reason: FinishReason::Stop,
            usage: CanonicalUsage {
                prompt_tokens: 2,
                completion_tokens: 2,
                total_tokens: 4,
            },
        };
        let json = serde_json::to_value(encode_openai_chat_response(&completion)).unwrap();
        assert_eq!(json["object"], "chat.completion");
        assert_eq!(json["choices"][0]["message"]["role"], "assistant");
        assert_eq!(json["choices"][0]["message"]["content"], "Hello");
        assert_eq!(json["choices"][0]["finish_reason"], "stop");
        assert_eq!(json["usage"]["total_tokens"], 4);
    }
}
