use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use http::{HeaderMap, HeaderValue};

use crate::error::CanonicalError;
use crate::protocol::bridge::response_decoder::{decode_bridge_line, BridgeLine};
use crate::protocol::canonical::BackendKind;
use crate::protocol::ProviderRequest;
use crate::stream::line_stream;
use crate::transport::{endpoint_url, HttpTransport};

use super::{
    encode_json_body, mismatched_request, BackendSource, OpenContext, RawEventStream,
    RawProviderEvent,
};

const CONVERSATION_PATH: &str = "/backend-api/conversation";

/// SSE bridge whose events each carry the full reply generated so far.
pub struct CumulativeSseBackend {
    transport: HttpTransport,
    url: url::Url,
    authorization: HeaderValue,
}

impl CumulativeSseBackend {
    /// # Errors
    ///
    /// Returns [`CanonicalError::Config`] when the endpoint URL or the
    /// credentials do not form valid request parts.
    pub fn new(
        transport: HttpTransport,
        base_url: &str,
        channel_id: &str,
        access_token: &str,
    ) -> Result<Self, CanonicalError> {
        let mut authorization =
            HeaderValue::from_str(&format!("Bearer {channel_id}@{access_token}")).map_err(
                |_| CanonicalError::Config("bridge credentials are not a valid header".into()),
            )?;
        authorization.set_sensitive(true);
        Ok(Self {
            transport,
            url: endpoint_url(base_url, CONVERSATION_PATH)?,
            authorization,
        })
    }
}

fn bridge_event(line: BridgeLine) -> RawProviderEvent {
    match line {
        BridgeLine::Snapshot(text) => RawProviderEvent::Cumulative(text),
        BridgeLine::Done => RawProviderEvent::Done,
    }
}

/// Turn a bridge response body into raw events. Transport failures while
/// reading become [`CanonicalError::UpstreamAbort`].
pub fn bridge_event_stream<S, E>(body: S) -> RawEventStream
where
    S: futures_util::Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    line_stream(body)
        .filter_map(|item| async move {
            match item {
                Ok(line) => decode_bridge_line(&line).map(|decoded| decoded.map(bridge_event)),
                Err(err) => Some(Err(CanonicalError::UpstreamAbort(err.to_string()))),
            }
        })
        .boxed()
}

impl BackendSource for CumulativeSseBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::CumulativeSse
    }

    fn open(
        &self,
        request: ProviderRequest,
        _context: OpenContext,
    ) -> BoxFuture<'static, Result<RawEventStream, CanonicalError>> {
        let body = match request {
            ProviderRequest::Bridge(wire) => encode_json_body(&wire),
            other => Err(mismatched_request(BackendKind::CumulativeSse, &other)),
        };
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(http::header::AUTHORIZATION, self.authorization.clone());
        headers.insert(
            http::header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let transport = self.transport.clone();
        let url = self.url.clone();

        Box::pin(async move {
            let response = transport
                .post_json_streaming(&url, headers, body?)
                .await?;
            Ok(bridge_event_stream(response.bytes_stream()))
        })
    }
}
