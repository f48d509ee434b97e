use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use http::{HeaderMap, HeaderValue};

use crate::error::CanonicalError;
use crate::protocol::canonical::BackendKind;
use crate::protocol::push::{PushFragment, PushRequest};
use crate::protocol::ProviderRequest;
use crate::stream::line_stream;
use crate::transport::{endpoint_url, HttpTransport};

use super::{
    encode_json_body, mismatched_request, BackendSource, OpenContext, RawEventStream,
    RawProviderEvent,
};

const SEND_MESSAGE_PATH: &str = "/send_message";

/// Fragments pushed by a [`PushClient`]. `Ok(None)` means the reply is done.
pub type FragmentStream = BoxStream<'static, Result<Option<String>, CanonicalError>>;

/// Client for a conversational push API that yields new text one fragment
/// at a time.
pub trait PushClient: Send + Sync + 'static {
    fn send_message(
        &self,
        request: PushRequest,
    ) -> BoxFuture<'static, Result<FragmentStream, CanonicalError>>;
}

/// [`PushClient`] speaking newline-delimited JSON over HTTP: each line is a
/// `{"text_new": ...}` object.
pub struct HttpPushClient {
    transport: HttpTransport,
    url: url::Url,
    authorization: HeaderValue,
}

impl HttpPushClient {
    /// # Errors
    ///
    /// Returns [`CanonicalError::Config`] when the endpoint URL or the token
    /// is invalid.
    pub fn new(
        transport: HttpTransport,
        base_url: &str,
        token: &str,
    ) -> Result<Self, CanonicalError> {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| CanonicalError::Config("push token is not a valid header".into()))?;
        authorization.set_sensitive(true);
        Ok(Self {
            transport,
            url: endpoint_url(base_url, SEND_MESSAGE_PATH)?,
            authorization,
        })
    }
}

/// Decode one NDJSON line. Blank lines carry nothing.
fn decode_fragment_line(line: &str) -> Option<Result<Option<String>, CanonicalError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(
        serde_json::from_str::<PushFragment>(line)
            .map(|fragment| fragment.text_new)
            .map_err(|e| CanonicalError::UpstreamProtocol(format!("Invalid push fragment: {e}"))),
    )
}

/// Turn an NDJSON response body into pushed fragments.
pub fn fragment_stream<S, E>(body: S) -> FragmentStream
where
    S: futures_util::Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    line_stream(body)
        .filter_map(|item| async move {
            match item {
                Ok(line) => decode_fragment_line(&line),
                Err(err) => Some(Err(CanonicalError::UpstreamAbort(err.to_string()))),
            }
        })
        .boxed()
}

impl PushClient for HttpPushClient {
    fn send_message(
        &self,
        request: PushRequest,
    ) -> BoxFuture<'static, Result<FragmentStream, CanonicalError>> {
        let body = encode_json_body(&request);
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(http::header::AUTHORIZATION, self.authorization.clone());
        headers.insert(
            http::header::ACCEPT,
            HeaderValue::from_static("application/x-ndjson"),
        );
        let transport = self.transport.clone();
        let url = self.url.clone();

        Box::pin(async move {
            let response = transport
                .post_json_streaming(&url, headers, body?)
                .await?;
            Ok(fragment_stream(response.bytes_stream()))
        })
    }
}

/// Backend adapter over any [`PushClient`].
pub struct PushBackend<C> {
    client: Arc<C>,
}

impl<C: PushClient> PushBackend<C> {
    #[must_use]
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

fn push_event(fragment: Option<String>) -> RawProviderEvent {
    match fragment {
        Some(text) => RawProviderEvent::Fragment(text),
        None => RawProviderEvent::Done,
    }
}

impl<C: PushClient> BackendSource for PushBackend<C> {
    fn kind(&self) -> BackendKind {
        BackendKind::Push
    }

    fn open(
        &self,
        request: ProviderRequest,
        _context: OpenContext,
    ) -> BoxFuture<'static, Result<RawEventStream, CanonicalError>> {
        let client = Arc::clone(&self.client);
        Box::pin(async move {
            let request = match request {
                ProviderRequest::Push(wire) => wire,
                other => return Err(mismatched_request(BackendKind::Push, &other)),
            };
            let fragments = client.send_message(request).await?;
            Ok(fragments.map(|item| item.map(push_event)).boxed())
        })
    }
}
