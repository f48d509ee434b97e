use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use crate::state::AppState;

const MODEL_CREATED_AT: u64 = 1_677_610_602;
const MODEL_OWNER: &str = "chatrelay";

/// `OpenAI` model list body for every canonical model the relay maps.
#[must_use]
pub fn models_response_body(ids: &[&str]) -> Value {
    let data: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "object": "model",
                "created": MODEL_CREATED_AT,
                "owned_by": MODEL_OWNER,
                "permission": [],
                "root": id,
                "parent": null,
            })
        })
        .collect();
    json!({ "object": "list", "data": data })
}

/// List the canonical models in `OpenAI` format.
#[must_use]
pub fn handler(State(state): State<Arc<AppState>>) -> Response {
    let body = models_response_body(&state.models().canonical_ids());
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/json"),
        )],
        Body::from(body.to_string()),
    )
        .into_response()
}
