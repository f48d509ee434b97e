//! Backend stream sources.
//!
//! Each backend opens one upstream conversation for a projected request and
//! hands back a lazy stream of raw provider events. Dropping that stream
//! drops the upstream response body and closes its connection.

pub mod completion;
pub mod cumulative;
pub mod push;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;

use crate::config::{AppConfig, BackendConfig};
use crate::error::CanonicalError;
use crate::protocol::canonical::BackendKind;
use crate::protocol::ProviderRequest;
use crate::transport::HttpTransport;

pub use completion::CompletionBackend;
pub use cumulative::CumulativeSseBackend;
pub use push::{HttpPushClient, PushBackend, PushClient};

/// One unit of an upstream reply, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawProviderEvent {
    /// The whole reply of a single-shot backend.
    Completion {
        text: String,
        stop_reason: Option<String>,
    },
    /// Full text generated so far.
    Cumulative(String),
    /// Newly generated text only.
    Fragment(String),
    /// Explicit end-of-reply signal.
    Done,
}

pub type RawEventStream = BoxStream<'static, Result<RawProviderEvent, CanonicalError>>;

/// Per-request inputs to `open` that are not part of the projected request.
#[derive(Debug, Clone, Default)]
pub struct OpenContext {
    /// API key presented by the client, used in place of the configured one.
    pub client_api_key: Option<String>,
}

/// A chat provider that can open a stream of raw events.
pub trait BackendSource: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Open the upstream for `request`.
    ///
    /// Failing to connect or a non-success status is an error of the returned
    /// future. Failures after that are items of the stream.
    fn open(
        &self,
        request: ProviderRequest,
        context: OpenContext,
    ) -> BoxFuture<'static, Result<RawEventStream, CanonicalError>>;
}

pub(crate) fn mismatched_request(expected: BackendKind, got: &ProviderRequest) -> CanonicalError {
    CanonicalError::Internal(format!(
        "{} backend received a {} request",
        expected.as_str(),
        got.kind().as_str()
    ))
}

pub(crate) fn encode_json_body<T: serde::Serialize>(
    value: &T,
) -> Result<bytes::Bytes, CanonicalError> {
    serde_json::to_vec(value)
        .map(bytes::Bytes::from)
        .map_err(|e| CanonicalError::Internal(format!("Failed to encode upstream request: {e}")))
}

/// Build the backend selected by the configuration.
///
/// # Errors
///
/// Returns [`CanonicalError::Config`] when the HTTP client or any backend
/// endpoint or credential header cannot be built.
pub fn build_backend(config: &AppConfig) -> Result<Arc<dyn BackendSource>, CanonicalError> {
    let transport = HttpTransport::new(&config.server, config.backend.proxy())?;
    let backend: Arc<dyn BackendSource> = match &config.backend {
        BackendConfig::Completion {
            base_url, api_key, ..
        } => Arc::new(CompletionBackend::new(transport, base_url, api_key)?),
        BackendConfig::CumulativeSse {
            base_url,
            channel_id,
            access_token,
            ..
        } => Arc::new(CumulativeSseBackend::new(
            transport,
            base_url,
            channel_id,
            access_token,
        )?),
        BackendConfig::Push {
            base_url, token, ..
        } => Arc::new(PushBackend::new(HttpPushClient::new(
            transport, base_url, token,
        )?)),
    };
    tracing::info!(
        backend = backend.kind().as_str(),
        base_url = config.backend.base_url(),
        "backend ready"
    );
    Ok(backend)
}
