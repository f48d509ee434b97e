use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use http::{HeaderMap, HeaderValue};

use crate::error::CanonicalError;
use crate::protocol::canonical::BackendKind;
use crate::protocol::completion::response_decoder::decode_completion_response;
use crate::protocol::ProviderRequest;
use crate::transport::{endpoint_url, HttpTransport};

use super::{
    encode_json_body, mismatched_request, BackendSource, OpenContext, RawEventStream,
    RawProviderEvent,
};

const COMPLETE_PATH: &str = "/v1/complete";
const API_KEY_HEADER: &str = "x-api-key";

/// Single-shot completion API. One call returns the whole reply, which is
/// surfaced as a stream of exactly one event.
pub struct CompletionBackend {
    transport: HttpTransport,
    url: url::Url,
    api_key: Option<HeaderValue>,
}

impl CompletionBackend {
    /// # Errors
    ///
    /// Returns [`CanonicalError::Config`] when the endpoint URL or the API key
    /// header value is invalid.
    pub fn new(
        transport: HttpTransport,
        base_url: &str,
        api_key: &str,
    ) -> Result<Self, CanonicalError> {
        let api_key = if api_key.is_empty() {
            None
        } else {
            Some(api_key_header(api_key)?)
        };
        Ok(Self {
            transport,
            url: endpoint_url(base_url, COMPLETE_PATH)?,
            api_key,
        })
    }

    fn headers(&self, context: &OpenContext) -> Result<HeaderMap, CanonicalError> {
        let key = match context.client_api_key.as_deref() {
            Some(client_key) => api_key_header(client_key)?,
            None => self.api_key.clone().ok_or_else(|| CanonicalError::Upstream {
                status: 401,
                message: "No API key configured or supplied".to_string(),
            })?,
        };
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(API_KEY_HEADER, key);
        headers.insert(http::header::ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

fn api_key_header(key: &str) -> Result<HeaderValue, CanonicalError> {
    let mut value = HeaderValue::from_str(key)
        .map_err(|_| CanonicalError::Config("API key is not a valid header value".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

impl BackendSource for CompletionBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Completion
    }

    fn open(
        &self,
        request: ProviderRequest,
        context: OpenContext,
    ) -> BoxFuture<'static, Result<RawEventStream, CanonicalError>> {
        let prepared = match request {
            ProviderRequest::Completion(wire) => self
                .headers(&context)
                .and_then(|headers| Ok((headers, encode_json_body(&wire)?))),
            other => Err(mismatched_request(BackendKind::Completion, &other)),
        };
        let transport = self.transport.clone();
        let url = self.url.clone();

        Box::pin(async move {
            let (headers, body) = prepared?;
            let response = transport.post_json(&url, headers, body).await?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| CanonicalError::UpstreamAbort(e.to_string()))?;
            let decoded = decode_completion_response(&bytes)?;
            tracing::debug!(
                stop_reason = decoded.stop_reason.as_deref().unwrap_or("none"),
                completion_len = decoded.completion.len(),
                "completion received"
            );
            let event = RawProviderEvent::Completion {
                text: decoded.completion,
                stop_reason: decoded.stop_reason,
            };
            Ok(futures_util::stream::once(async move { Ok(event) }).boxed())
        })
    }
}
