use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chatrelay::backend::build_backend;
use chatrelay::config::{AppConfig, BackendConfig};
use chatrelay::routing::dispatch::dispatch_request;
use chatrelay::state::AppState;
use serde_json::{json, Value};

async fn spawn_upstream(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), server)
}

fn build_state(backend: BackendConfig) -> Arc<AppState> {
    let config = AppConfig {
        backend,
        ..AppConfig::default()
    };
    let source = build_backend(&config).expect("build backend");
    Arc::new(AppState::new(config, source))
}

fn completion_config(base_url: String, api_key: &str) -> BackendConfig {
    BackendConfig::Completion {
        base_url,
        api_key: api_key.to_string(),
        proxy: None,
    }
}

fn bridge_config(base_url: String) -> BackendConfig {
    BackendConfig::CumulativeSse {
        base_url,
        channel_id: "C01".to_string(),
        access_token: "xoxp-1".to_string(),
        proxy: None,
    }
}

fn chat_request(body: &Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json");
    if let Some(key) = bearer {
        builder = builder.header("authorization", format!("Bearer {key}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(body).expect("serialize")))
        .expect("build request")
}

async fn send(state: Arc<AppState>, request: Request<Body>) -> Response {
    dispatch_request(state, Arc::<str>::from(""), request)
        .await
        .expect("dispatch")
}

async fn body_bytes(response: Response) -> bytes::Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body")
}

/// Split an SSE body into its chunk payloads and whether it ended with `[DONE]`.
fn sse_chunks(body: &[u8]) -> (Vec<Value>, bool) {
    let text = std::str::from_utf8(body).expect("utf8 body");
    let mut chunks = Vec::new();
    let mut done = false;
    for frame in text.split("\n\n").filter(|f| !f.is_empty()) {
        let payload = frame.strip_prefix("data: ").expect("data frame");
        assert!(!done, "frame after [DONE]: {payload}");
        if payload == "[DONE]" {
            done = true;
        } else {
            chunks.push(serde_json::from_str(payload).expect("chunk json"));
        }
    }
    (chunks, done)
}

fn contents(chunks: &[Value]) -> Vec<String> {
    chunks
        .iter()
        .map(|c| {
            c["choices"][0]["delta"]["content"]
                .as_str()
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

fn completion_app() -> Router {
    Router::new().route(
        "/v1/complete",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some("sk-upstream") {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error": {"message": "bad key"}})),
                )
                    .into_response();
            }
            let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
            assert!(prompt.ends_with("\n\nAssistant: "), "prompt: {prompt:?}");
            Json(json!({
                "completion": format!("model={}", body["model"].as_str().unwrap_or_default()),
                "stop_reason": "stop_sequence",
                "model": body["model"],
            }))
            .into_response()
        }),
    )
}

#[tokio::test]
async fn test_completion_backend_non_stream() {
    let (base_url, server) = spawn_upstream(completion_app()).await;
    let state = build_state(completion_config(base_url, "sk-upstream"));

    let response = send(
        state,
        chat_request(
            &json!({"model": "gpt-4", "messages": [{"role": "user", "content": "hi"}]}),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body_bytes(response).await).expect("json");
    assert_eq!(payload["object"], "chat.completion");
    assert_eq!(payload["model"], "gpt-4");
    assert_eq!(payload["choices"][0]["message"]["content"], "model=claude-v1.3");
    assert_eq!(payload["choices"][0]["finish_reason"], "stop");
    assert!(payload["id"].as_str().unwrap().starts_with("chatcmpl-"));

    server.abort();
}

#[tokio::test]
async fn test_completion_backend_stream_is_single_terminal_chunk() {
    let (base_url, server) = spawn_upstream(completion_app()).await;
    let state = build_state(completion_config(base_url, "sk-upstream"));

    let response = send(
        state,
        chat_request(
            &json!({
                "model": "gpt-3.5-turbo",
                "stream": true,
                "messages": [{"role": "user", "content": "hi"}]
            }),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    let (chunks, done) = sse_chunks(&body_bytes(response).await);
    assert!(done);
    assert_eq!(chunks.len(), 1);
    assert_eq!(contents(&chunks), vec!["model=claude-instant-v1"]);
    assert_eq!(chunks[0]["choices"][0]["finish_reason"], "stop");
    assert_eq!(chunks[0]["object"], "chat.completion.chunk");

    server.abort();
}

#[tokio::test]
async fn test_client_bearer_key_is_forwarded() {
    let (base_url, server) = spawn_upstream(completion_app()).await;
    let state = build_state(completion_config(base_url, ""));
    let body = json!({"model": "gpt-4", "messages": [{"role": "user", "content": "hi"}]});

    let response = send(Arc::clone(&state), chat_request(&body, Some("sk-upstream"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body_bytes(response).await).expect("json");
    assert_eq!(payload["choices"][0]["finish_reason"], "stop");

    let response = send(Arc::clone(&state), chat_request(&body, Some("sk-wrong"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body_bytes(response).await).expect("json");
    assert_eq!(payload["choices"][0]["finish_reason"], "error");
    assert_eq!(payload["choices"][0]["message"]["content"], "");

    let response = send(state, chat_request(&body, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body_bytes(response).await).expect("json");
    assert_eq!(payload["choices"][0]["finish_reason"], "error");

    server.abort();
}

async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind placeholder");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

#[tokio::test]
async fn test_completion_connect_failure_non_stream_is_error_completion() {
    let state = build_state(completion_config(closed_port_url().await, "sk-upstream"));

    let response = send(
        state,
        chat_request(
            &json!({"model": "gpt-4", "messages": [{"role": "user", "content": "Hi"}]}),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body_bytes(response).await).expect("json");
    assert_eq!(payload["object"], "chat.completion");
    assert_eq!(payload["choices"][0]["finish_reason"], "error");
    assert_eq!(payload["choices"][0]["message"]["role"], "assistant");
    assert_eq!(payload["choices"][0]["message"]["content"], "");
    assert!(payload.get("error").is_none());
}

#[tokio::test]
async fn test_bridge_stream_emits_deltas_then_done() {
    let app = Router::new().route(
        "/backend-api/conversation",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            assert_eq!(
                headers.get("authorization").and_then(|v| v.to_str().ok()),
                Some("Bearer C01@xoxp-1")
            );
            assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
            assert_eq!(body["messages"][0]["content"]["parts"][0], "second");
            let events = [
                r#"data: {"message":{"content":{"parts":["H"]}}}"#,
                r#"data: {"message":{"content":{"parts":["He"]}}}"#,
                "data: not json",
                r#"data: {"message":{"content":{"parts":["Hello"]}}}"#,
                "data: [DONE]",
            ];
            let mut sse = String::new();
            for event in events {
                sse.push_str(event);
                sse.push_str("\n\n");
            }
            ([(header::CONTENT_TYPE, "text/event-stream")], sse)
        }),
    );
    let (base_url, server) = spawn_upstream(app).await;
    let state = build_state(bridge_config(base_url));

    let response = send(
        state,
        chat_request(
            &json!({
                "model": "gpt-4",
                "stream": true,
                "messages": [
                    {"role": "user", "content": "first"},
                    {"role": "user", "content": "second"}
                ]
            }),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let (chunks, done) = sse_chunks(&body_bytes(response).await);
    assert!(done);
    assert_eq!(contents(&chunks), vec!["H", "e", "llo", ""]);
    assert_eq!(chunks[3]["choices"][0]["finish_reason"], "done");
    assert_eq!(chunks[3]["choices"][0]["delta"], json!({}));
    let id = &chunks[0]["id"];
    assert!(chunks.iter().all(|c| &c["id"] == id && c["model"] == "gpt-4"));

    server.abort();
}

#[tokio::test]
async fn test_bridge_upstream_failure_yields_error_chunk() {
    let app = Router::new().route(
        "/backend-api/conversation",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let (base_url, server) = spawn_upstream(app).await;
    let state = build_state(bridge_config(base_url));

    let response = send(
        state,
        chat_request(
            &json!({
                "model": "gpt-4",
                "stream": true,
                "messages": [{"role": "user", "content": "hi"}]
            }),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let (chunks, done) = sse_chunks(&body_bytes(response).await);
    assert!(done);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0]["choices"][0]["finish_reason"], "error");

    server.abort();
}

#[tokio::test]
async fn test_push_backend_streams_fragments() {
    let app = Router::new().route(
        "/send_message",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            assert_eq!(
                headers.get("authorization").and_then(|v| v.to_str().ok()),
                Some("Bearer push-token")
            );
            assert_eq!(body["bot"], "sage");
            assert_eq!(body["prompt"], "hi");
            "{\"text_new\":\"Hel\"}\n{\"text_new\":\"lo\"}\n{\"text_new\":null}\n"
        }),
    );
    let (base_url, server) = spawn_upstream(app).await;
    let state = build_state(BackendConfig::Push {
        base_url,
        token: "push-token".to_string(),
        bot: "sage".to_string(),
        proxy: None,
    });

    let response = send(
        state,
        chat_request(
            &json!({
                "model": "gpt-4",
                "stream": true,
                "messages": [{"role": "user", "content": "hi"}]
            }),
            None,
        ),
    )
    .await;
    let (chunks, done) = sse_chunks(&body_bytes(response).await);
    assert!(done);
    assert_eq!(contents(&chunks), vec!["Hel", "lo", ""]);
    assert_eq!(chunks[2]["choices"][0]["finish_reason"], "done");

    server.abort();
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let state = build_state(completion_config("http://127.0.0.1:9".to_string(), "k"));

    let response = send(
        Arc::clone(&state),
        chat_request(&json!({"model": "gpt-4"}), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload: Value = serde_json::from_slice(&body_bytes(response).await).expect("json");
    assert_eq!(payload["error"]["type"], "invalid_request_error");

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .body(Body::from("{not json"))
        .expect("build request");
    let response = send(state, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_models_endpoint_and_cors() {
    let state = build_state(completion_config("http://127.0.0.1:9".to_string(), "k"));

    let request = Request::builder()
        .method("GET")
        .uri("/v1/models")
        .body(Body::empty())
        .expect("build request");
    let response = send(Arc::clone(&state), request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
    let payload: Value = serde_json::from_slice(&body_bytes(response).await).expect("json");
    let ids: Vec<&str> = payload["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"gpt-4"));
    assert!(ids.contains(&"gpt-3.5-turbo"));

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::empty())
        .expect("build request");
    let response = send(Arc::clone(&state), request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body_bytes(response).await).expect("json");
    assert_eq!(payload["config"]["backend"], "completion");
    assert!(payload["config"].get("api_key").is_none());

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/v1/chat/completions")
        .body(Body::empty())
        .expect("build request");
    let response = send(state, request).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_METHODS)
        .is_some());
}
