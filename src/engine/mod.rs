//! Stream session orchestration.

pub mod non_stream;
pub mod session;

use std::sync::Arc;

use crate::backend::{BackendSource, OpenContext};
use crate::config::BackendConfig;
use crate::observability::token_counter::estimate_request_tokens;
use crate::protocol::canonical::{BackendKind, CanonicalRequest};
use crate::protocol::mapping::ModelMap;
use crate::protocol::project;
use crate::stream::ResponseNormalizer;

pub use session::{SessionState, StreamSession};

/// Identity shared by every chunk of one response.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub id: Arc<str>,
    pub created_at: u64,
}

/// Immutable per-process wiring between the configured backend and the
/// sessions that use it.
pub struct Orchestrator {
    backend: Arc<dyn BackendSource>,
    backend_config: BackendConfig,
    models: ModelMap,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        backend: Arc<dyn BackendSource>,
        backend_config: BackendConfig,
        models: ModelMap,
    ) -> Self {
        Self {
            backend,
            backend_config,
            models,
        }
    }

    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    #[must_use]
    pub fn models(&self) -> &ModelMap {
        &self.models
    }

    /// Project `request` for the configured backend and start a session in
    /// the `Init` state. Nothing is sent upstream until the session is polled.
    #[must_use]
    pub fn open_session(
        &self,
        request: &CanonicalRequest,
        context: OpenContext,
        identity: SessionIdentity,
    ) -> StreamSession {
        let provider_request = project(request, &self.backend_config, &self.models);
        let normalizer = ResponseNormalizer::new(
            identity.id,
            Arc::from(request.model.as_str()),
            identity.created_at,
        );
        StreamSession::new(
            Arc::clone(&self.backend),
            provider_request,
            context,
            normalizer,
            estimate_request_tokens(request),
        )
    }
}
