use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::response::Response;
use bytes::Bytes;
use futures_util::StreamExt;
use http::HeaderMap;

use crate::auth::extract_bearer_key;
use crate::backend::OpenContext;
use crate::error::{into_axum_response, CanonicalError};
use crate::protocol::openai_chat::decoder::{
    decode_openai_chat_request, parse_openai_chat_request_wire,
};
use crate::protocol::openai_chat::response_encoder::{
    encode_openai_chat_response, encode_openai_chunk_frame,
};
use crate::state::AppState;
use crate::stream::DONE_FRAME;

/// `POST /v1/chat/completions`.
pub async fn handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match handle(&state, &headers, &body).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "chat completion request failed");
            into_axum_response(&err)
        }
    }
}

async fn handle(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, CanonicalError> {
    let ids = state.next_request_ids();
    let wire = parse_openai_chat_request_wire(body)?;
    let request = decode_openai_chat_request(wire, ids.request_id)?;
    let context = OpenContext {
        client_api_key: extract_bearer_key(headers).map(str::to_string),
    };

    tracing::info!(
        request_id = %request.request_id,
        model = %request.model,
        stream = request.stream,
        messages = request.messages.len(),
        backend = state.orchestrator.backend_kind().as_str(),
        "chat completion request"
    );

    if request.stream {
        let session = state
            .orchestrator
            .open_session(&request, context, ids.session);
        let frames = session
            .into_stream()
            .map(|chunk| Ok::<_, Infallible>(Bytes::from(encode_openai_chunk_frame(&chunk))))
            .chain(futures_util::stream::once(async {
                Ok::<_, Infallible>(Bytes::from_static(DONE_FRAME.as_bytes()))
            }));
        return Ok(sse_ok_response(Body::from_stream(frames)));
    }

    let completion = state
        .orchestrator
        .complete(&request, context, ids.session)
        .await?;
    let body = serde_json::to_vec(&encode_openai_chat_response(&completion))
        .map_err(|e| CanonicalError::Internal(format!("failed to encode response: {e}")))?;
    Ok(ok_json_response(Bytes::from(body)))
}

fn sse_ok_response(body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}

#[inline]
fn ok_json_response(body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = http::StatusCode::OK;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    response
}
