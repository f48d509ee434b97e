use std::sync::Arc;
use std::time::Instant;

use futures_util::{Stream, StreamExt};

use crate::backend::{BackendSource, OpenContext, RawEventStream, RawProviderEvent};
use crate::error::CanonicalError;
use crate::observability::log_request_complete;
use crate::protocol::canonical::{BackendKind, CanonicalChunk, CanonicalUsage, FinishReason};
use crate::protocol::ProviderRequest;
use crate::stream::{IncrementalDiffer, ResponseNormalizer};

/// Lifecycle of one stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Provider request built, upstream not contacted yet.
    Init,
    /// Opening the upstream.
    Requesting,
    /// Pulling raw events.
    Streaming,
    /// Terminal chunk emitted; absorbing.
    Terminated,
}

/// Drives one request from projected provider request to terminal chunk.
///
/// Yields chunks in upstream order and always ends with exactly one terminal
/// chunk, whatever the upstream does. Dropping the session drops the
/// upstream stream.
pub struct StreamSession {
    state: SessionState,
    backend: Arc<dyn BackendSource>,
    kind: BackendKind,
    pending: Option<(ProviderRequest, OpenContext)>,
    events: Option<RawEventStream>,
    differ: IncrementalDiffer,
    normalizer: ResponseNormalizer,
    prompt_tokens: u64,
    error: Option<CanonicalError>,
    started: Instant,
}

impl StreamSession {
    #[must_use]
    pub fn new(
        backend: Arc<dyn BackendSource>,
        request: ProviderRequest,
        context: OpenContext,
        normalizer: ResponseNormalizer,
        prompt_tokens: u64,
    ) -> Self {
        let kind = backend.kind();
        Self {
            state: SessionState::Init,
            backend,
            kind,
            pending: Some((request, context)),
            events: None,
            differ: IncrementalDiffer::new(),
            normalizer,
            prompt_tokens,
            error: None,
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn id(&self) -> &Arc<str> {
        self.normalizer.id()
    }

    #[must_use]
    pub fn created_at(&self) -> u64 {
        self.normalizer.created_at()
    }

    /// The failure that ended the session with an `error` chunk, if any.
    pub fn take_error(&mut self) -> Option<CanonicalError> {
        self.error.take()
    }

    #[must_use]
    pub fn usage(&self) -> CanonicalUsage {
        let completion_tokens = self.normalizer.completion_tokens();
        CanonicalUsage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens,
            total_tokens: self.prompt_tokens + completion_tokens,
        }
    }

    /// Produce the next chunk, or `None` once the terminal chunk was emitted.
    pub async fn next_chunk(&mut self) -> Option<CanonicalChunk> {
        loop {
            match self.state {
                SessionState::Init => self.state = SessionState::Requesting,
                SessionState::Requesting => {
                    let Some((request, context)) = self.pending.take() else {
                        return Some(self.fail(CanonicalError::Internal(
                            "session has no pending request".to_string(),
                        )));
                    };
                    match self.backend.open(request, context).await {
                        Ok(events) => {
                            self.events = Some(events);
                            self.state = SessionState::Streaming;
                        }
                        Err(err) => {
                            if err.is_connect_failure() {
                                tracing::warn!(
                                    session = %self.normalizer.id(),
                                    backend = self.kind.as_str(),
                                    error = %err,
                                    "failed to open upstream"
                                );
                            } else {
                                tracing::error!(
                                    session = %self.normalizer.id(),
                                    backend = self.kind.as_str(),
                                    error = %err,
                                    "could not prepare upstream request"
                                );
                            }
                            return Some(self.fail(err));
                        }
                    }
                }
                SessionState::Streaming => {
                    let next = match self.events.as_mut() {
                        Some(events) => events.next().await,
                        None => None,
                    };
                    if let Some(chunk) = self.on_event(next) {
                        return Some(chunk);
                    }
                }
                SessionState::Terminated => return None,
            }
        }
    }

    fn on_event(
        &mut self,
        event: Option<Result<RawProviderEvent, CanonicalError>>,
    ) -> Option<CanonicalChunk> {
        match event {
            Some(Ok(RawProviderEvent::Completion { text, stop_reason })) => {
                let chunk = self.normalizer.completion(text, stop_reason.as_deref());
                self.finish();
                Some(chunk)
            }
            Some(Ok(RawProviderEvent::Cumulative(snapshot))) => {
                let delta = self.differ.advance(snapshot);
                Some(self.normalizer.delta(delta))
            }
            Some(Ok(RawProviderEvent::Fragment(text))) => Some(self.normalizer.delta(text)),
            Some(Ok(RawProviderEvent::Done)) => Some(self.terminate(FinishReason::Done)),
            Some(Err(err)) if err.is_recoverable_in_stream() => {
                tracing::warn!(
                    session = %self.normalizer.id(),
                    error = %err,
                    "dropping malformed upstream event"
                );
                None
            }
            Some(Err(err)) => {
                tracing::warn!(
                    session = %self.normalizer.id(),
                    backend = self.kind.as_str(),
                    error = %err,
                    "upstream stream failed"
                );
                Some(self.fail(err))
            }
            None => {
                tracing::debug!(
                    session = %self.normalizer.id(),
                    "upstream ended without an end-of-reply signal"
                );
                Some(self.terminate(FinishReason::Done))
            }
        }
    }

    fn fail(&mut self, err: CanonicalError) -> CanonicalChunk {
        self.error = Some(err);
        self.terminate(FinishReason::Error)
    }

    fn terminate(&mut self, reason: FinishReason) -> CanonicalChunk {
        let chunk = self.normalizer.terminal(reason);
        self.finish();
        chunk
    }

    fn finish(&mut self) {
        self.state = SessionState::Terminated;
        self.pending = None;
        self.events = None;
        log_request_complete(
            self.normalizer.model(),
            self.kind.as_str(),
            &self.usage(),
            self.normalizer.chunks(),
            self.started,
        );
    }

    /// Consume the session as a stream of chunks.
    pub fn into_stream(self) -> impl Stream<Item = CanonicalChunk> + Send {
        futures_util::stream::unfold(self, |mut session| async move {
            let chunk = session.next_chunk().await?;
            Some((chunk, session))
        })
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if self.state != SessionState::Terminated {
            tracing::debug!(
                session = %self.normalizer.id(),
                state = ?self.state,
                "session dropped before termination; releasing upstream"
            );
        }
    }
}
