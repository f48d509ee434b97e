use std::sync::Arc;

use crate::observability::token_counter::{count_delta_units, estimate_tokens};
use crate::protocol::canonical::{CanonicalChunk, ChunkUsage, FinishReason};
use crate::protocol::mapping::completion_stop_to_canonical;

/// Turns upstream text into canonical chunks for one session.
///
/// Every chunk carries the session's id, creation time and model.
#[derive(Debug)]
pub struct ResponseNormalizer {
    id: Arc<str>,
    created_at: u64,
    model: Arc<str>,
    chunks: u64,
    completion_tokens: u64,
}

impl ResponseNormalizer {
    #[must_use]
    pub fn new(id: Arc<str>, model: Arc<str>, created_at: u64) -> Self {
        Self {
            id,
            created_at,
            model,
            chunks: 0,
            completion_tokens: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> &Arc<str> {
        &self.id
    }

    #[must_use]
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    #[must_use]
    pub fn model(&self) -> &Arc<str> {
        &self.model
    }

    /// Chunks produced so far.
    #[must_use]
    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    /// Completion tokens accounted over every chunk produced so far.
    #[must_use]
    pub fn completion_tokens(&self) -> u64 {
        self.completion_tokens
    }

    /// Non-terminal chunk for a streamed delta. Usage counts the delta's
    /// characters.
    pub fn delta(&mut self, text: String) -> CanonicalChunk {
        let units = count_delta_units(&text);
        self.chunk(text, None, units)
    }

    /// Terminal chunk for a single-shot completion carrying the full text.
    pub fn completion(&mut self, text: String, stop_reason: Option<&str>) -> CanonicalChunk {
        let tokens = estimate_tokens(&text);
        let reason = completion_stop_to_canonical(stop_reason);
        self.chunk(text, Some(reason), tokens)
    }

    /// Empty terminal chunk.
    pub fn terminal(&mut self, reason: FinishReason) -> CanonicalChunk {
        self.chunk(String::new(), Some(reason), 0)
    }

    fn chunk(
        &mut self,
        delta_text: String,
        finish_reason: Option<FinishReason>,
        completion_tokens: u64,
    ) -> CanonicalChunk {
        self.chunks += 1;
        self.completion_tokens += completion_tokens;
        CanonicalChunk {
            id: Arc::clone(&self.id),
            created_at: self.created_at,
            model: Arc::clone(&self.model),
            delta_text,
            finish_reason,
            usage: ChunkUsage {
                completion_tokens,
                total_tokens: completion_tokens,
            },
        }
    }
}
