use std::sync::Arc;

use crate::backend::OpenContext;
use crate::error::CanonicalError;
use crate::observability::token_counter::estimate_request_tokens;
use crate::protocol::canonical::{
    CanonicalCompletion, CanonicalRequest, CanonicalUsage, FinishReason,
};

use super::{Orchestrator, SessionIdentity};

impl Orchestrator {
    /// Run a request for a caller that did not ask for streaming.
    ///
    /// The single-shot backend's one chunk becomes the completion, including
    /// the synthetic `error` chunk of a failed upstream. Cumulative and push
    /// backends are not opened at all: the caller receives an empty
    /// completion with finish reason `done`.
    ///
    /// # Errors
    ///
    /// Currently never returns `Err`; upstream failures surface as
    /// [`FinishReason::Error`].
    pub async fn complete(
        &self,
        request: &CanonicalRequest,
        context: OpenContext,
        identity: SessionIdentity,
    ) -> Result<CanonicalCompletion, CanonicalError> {
        let model: Arc<str> = Arc::from(request.model.as_str());
        let prompt_tokens = estimate_request_tokens(request);

        if self.backend_kind().is_streaming_only() {
            tracing::debug!(
                backend = self.backend_kind().as_str(),
                "non-streaming request on a streaming backend; returning synthetic done"
            );
            return Ok(CanonicalCompletion {
                id: identity.id,
                created_at: identity.created_at,
                model,
                content: String::new(),
                finish_reason: FinishReason::Done,
                usage: CanonicalUsage {
                    prompt_tokens,
                    completion_tokens: 0,
                    total_tokens: prompt_tokens,
                },
            });
        }

        let mut session = self.open_session(request, context, identity);
        let mut content = String::new();
        let mut finish_reason = FinishReason::Done;
        while let Some(chunk) = session.next_chunk().await {
            content.push_str(&chunk.delta_text);
            if let Some(reason) = chunk.finish_reason {
                finish_reason = reason;
            }
        }
        if let Some(err) = session.take_error() {
            tracing::warn!(
                session = %session.id(),
                backend = self.backend_kind().as_str(),
                error = %err,
                "non-streaming request ended with an error finish reason"
            );
        }

        Ok(CanonicalCompletion {
            id: Arc::clone(session.id()),
            created_at: session.created_at(),
            model,
            content,
            finish_reason,
            usage: session.usage(),
        })
    }
}
