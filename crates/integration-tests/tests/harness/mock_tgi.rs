//! Mock Text Generation Inference server for integration tests
//!
//! Serves `/v1/chat/completions` with a canned reply, in both the plain JSON
//! and the server-sent event form, and records what it was sent.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// What the mock answers with
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Assistant text; streamed one word per event
    Text(String),
    /// Assistant tool calls as `(id, name, arguments)`; arguments are sent verbatim
    ToolCalls(Vec<(String, String, Value)>),
    /// A completion with an empty `choices` list
    NoChoices,
    /// An error status with a JSON body
    Error(StatusCode, Value),
    /// An SSE stream that reports an error after the first event
    StreamError(String),
}

/// Mock server bound to an ephemeral local port
pub struct MockTgi {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockTgiState>,
}

struct MockTgiState {
    reply: MockReply,
    /// Send the usage-only terminal event when asked for it
    stream_usage: bool,
    /// Line terminator used in streamed event bodies
    line_ending: &'static str,
    request_count: AtomicU32,
    requests: Mutex<Vec<Value>>,
    authorization: Mutex<Option<String>>,
}

impl MockTgi {
    /// Start the mock server, returning immediately
    pub async fn start(reply: MockReply) -> anyhow::Result<Self> {
        Self::start_inner(reply, true, "\n").await
    }

    /// Start a mock server that never sends usage in streams
    pub async fn start_without_usage(reply: MockReply) -> anyhow::Result<Self> {
        Self::start_inner(reply, false, "\n").await
    }

    /// Start a mock server that terminates streamed lines with `line_ending`
    pub async fn start_with_line_ending(reply: MockReply, line_ending: &'static str) -> anyhow::Result<Self> {
        Self::start_inner(reply, true, line_ending).await
    }

    async fn start_inner(reply: MockReply, stream_usage: bool, line_ending: &'static str) -> anyhow::Result<Self> {
        let state = Arc::new(MockTgiState {
            reply,
            stream_usage,
            line_ending,
            request_count: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
            authorization: Mutex::new(None),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL to configure the generator with
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of chat completion requests received
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }

    /// Body of the most recent request
    pub fn last_request(&self) -> Option<Value> {
        self.state.requests.lock().unwrap().last().cloned()
    }

    /// `Authorization` header of the most recent request
    pub fn last_authorization(&self) -> Option<String> {
        self.state.authorization.lock().unwrap().clone()
    }
}

impl Drop for MockTgi {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// -- Handlers --

async fn handle_chat_completions(
    State(state): State<Arc<MockTgiState>>,
    headers: HeaderMap,
    Json(req): Json<Value>,
) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    *state.authorization.lock().unwrap() = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);
    state.requests.lock().unwrap().push(req.clone());

    let streaming = req["stream"].as_bool().unwrap_or(false);
    let wants_usage = req["stream_options"]["include_usage"].as_bool().unwrap_or(false);

    match &state.reply {
        MockReply::Error(status, body) => (*status, Json(body.clone())).into_response(),
        MockReply::StreamError(message) if streaming => stream_error_response(message),
        _ if streaming => streaming_response(&state.reply, state.stream_usage && wants_usage, state.line_ending),
        reply => Json(completion_body(reply)).into_response(),
    }
}

fn usage() -> Value {
    json!({"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19})
}

fn completion_body(reply: &MockReply) -> Value {
    let message = match reply {
        MockReply::Text(text) => json!({"role": "assistant", "content": text}),
        MockReply::ToolCalls(calls) => json!({
            "role": "assistant",
            "content": null,
            "tool_calls": calls
                .iter()
                .map(|(id, name, arguments)| json!({
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": arguments}
                }))
                .collect::<Vec<_>>()
        }),
        MockReply::NoChoices => {
            return json!({"object": "chat.completion", "model": "tgi", "choices": [], "usage": usage()});
        }
        MockReply::Error(..) | MockReply::StreamError(_) => json!({"role": "assistant", "content": ""}),
    };

    let finish_reason = if matches!(reply, MockReply::ToolCalls(_)) {
        "tool_calls"
    } else {
        "eos_token"
    };

    json!({
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "tgi",
        "choices": [{"index": 0, "message": message, "finish_reason": finish_reason}],
        "usage": usage()
    })
}

fn stream_event(delta: &Value, finish_reason: Option<&str>) -> String {
    let event = json!({
        "object": "chat.completion.chunk",
        "created": 1_700_000_000,
        "model": "tgi",
        "choices": [{"index": 0, "delta": delta, "finish_reason": finish_reason}]
    });
    format!("data: {event}\n\n")
}

fn sse(body: String) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

/// Build an SSE streaming response body
fn streaming_response(reply: &MockReply, send_usage: bool, line_ending: &str) -> Response {
    let text = match reply {
        MockReply::Text(text) => text.clone(),
        _ => String::new(),
    };

    let mut body = String::new();

    // Role event
    body.push_str(&stream_event(&json!({"role": "assistant", "content": ""}), None));

    // Content events (one per word)
    for (i, word) in text.split(' ').enumerate() {
        let content = if i == 0 { word.to_owned() } else { format!(" {word}") };
        body.push_str(&stream_event(&json!({"role": "assistant", "content": content}), None));
    }

    // A keep-alive comment, which clients must ignore
    body.push_str(": ping\n\n");

    // Finish event
    body.push_str(&stream_event(&json!({"role": "assistant", "content": ""}), Some("eos_token")));

    if send_usage {
        let event = json!({
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": "tgi",
            "choices": [],
            "usage": usage()
        });
        body.push_str(&format!("data: {event}\n\n"));
    }

    body.push_str("data: [DONE]\n\n");

    sse(body.replace('\n', line_ending))
}

fn stream_error_response(message: &str) -> Response {
    let mut body = stream_event(&json!({"role": "assistant", "content": "partial"}), None);
    body.push_str(&format!("data: {}\n\n", json!({"error": message, "error_type": "generation"})));
    body.push_str(&stream_event(&json!({"content": "never seen"}), None));
    sse(body)
}
