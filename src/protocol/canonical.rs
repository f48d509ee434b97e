use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The family of upstream a backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Single-shot completion API: one request, one full response object.
    Completion,
    /// Chunked SSE bridge whose events carry the whole text generated so far.
    CumulativeSse,
    /// Conversational push API yielding one new fragment at a time.
    Push,
}

impl BackendKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Completion => "completion",
            BackendKind::CumulativeSse => "cumulative_sse",
            BackendKind::Push => "push",
        }
    }

    /// Conversational backends that only serve streaming callers.
    #[must_use]
    pub fn is_streaming_only(self) -> bool {
        matches!(self, BackendKind::CumulativeSse | BackendKind::Push)
    }
}

/// Canonical message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalRole {
    System,
    User,
    Assistant,
}

impl CanonicalRole {
    /// Two-party transcript name. Every non-assistant role is the human party.
    #[must_use]
    pub fn party_name(self) -> &'static str {
        match self {
            CanonicalRole::System | CanonicalRole::User => "Human",
            CanonicalRole::Assistant => "Assistant",
        }
    }
}

/// A single message in the canonical conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalMessage {
    pub role: CanonicalRole,
    pub content: String,
}

impl CanonicalMessage {
    #[must_use]
    pub fn new(role: CanonicalRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The fully-decoded, provider-agnostic request.
#[derive(Debug, Clone)]
pub struct CanonicalRequest {
    pub request_id: uuid::Uuid,
    pub model: String,
    pub messages: Vec<CanonicalMessage>,
    pub stream: bool,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f64>,
    pub stop: Option<Vec<String>>,
}

impl CanonicalRequest {
    /// Content of the final message, the only input last-message backends see.
    #[must_use]
    pub fn last_message_content(&self) -> Option<&str> {
        self.messages.last().map(|message| message.content.as_str())
    }
}

/// Reason a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinishReason {
    Stop,
    Length,
    Error,
    Done,
}

impl FinishReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::Error => "error",
            FinishReason::Done => "done",
        }
    }
}

/// Token accounting attached to each chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkUsage {
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// The unit a caller receives from a stream session.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalChunk {
    pub id: Arc<str>,
    pub created_at: u64,
    pub model: Arc<str>,
    pub delta_text: String,
    pub finish_reason: Option<FinishReason>,
    pub usage: ChunkUsage,
}

impl CanonicalChunk {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// Prompt/completion/total token counts of a finished non-streaming response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// A completed response assembled for non-streaming callers.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalCompletion {
    pub id: Arc<str>,
    pub created_at: u64,
    pub model: Arc<str>,
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: CanonicalUsage,
}
