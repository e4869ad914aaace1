//! HTTP clients for the Hugging Face chat completion API
//!
//! [`InferenceClient`] serves the blocking call shape and
//! [`AsyncInferenceClient`] the async one. Both talk to the same resolved
//! [`Endpoint`] and share event decoding, so the two shapes only differ in
//! how bytes come off the socket.

use std::fmt;
use std::io::{self, Read};
use std::pin::Pin;
use std::time::Duration;

use eventsource_stream::{EventStreamError, Eventsource};
use futures::executor::{self, BlockingStream};
use futures_util::{Stream, StreamExt, future, stream};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use url::Url;
use weft_core::{CoreError, is_valid_http_url};

use crate::api_type::HfApiType;
use crate::error::{HfError, Result};
use crate::protocol::{ChatCompletionOutput, ChatCompletionRequest, ChatCompletionStreamOutput, StreamPayload};

/// Chat completion route of the serverless Inference Providers router
pub const SERVERLESS_CHAT_URL: &str = "https://router.huggingface.co/v1/chat/completions";

/// Model name dedicated servers expect in the request body
const SERVER_MODEL: &str = "tgi";

const KNOWN_API_PARAMS: [&str; 5] = ["model", "url", "provider", "timeout", "headers"];

/// Async stream of decoded chat completion events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionStreamOutput>> + Send>>;

// -- Endpoint --

/// Where and how to reach the chat completion API
#[derive(Debug, Clone)]
pub struct Endpoint {
    chat_url: Url,
    model_or_url: String,
    payload_model: String,
    timeout: Option<Duration>,
    headers: HeaderMap,
}

impl Endpoint {
    /// Resolve the endpoint for an API variant from its `api_params`
    ///
    /// Serverless calls need `model`; the other variants need a valid HTTP
    /// `url`. Keys this client does not understand are logged and ignored.
    pub fn resolve(api_type: HfApiType, api_params: &Map<String, Value>) -> std::result::Result<Self, CoreError> {
        for key in api_params.keys() {
            if !KNOWN_API_PARAMS.contains(&key.as_str()) {
                tracing::warn!(api_type = %api_type, key = %key, "ignoring unknown api_params key");
            }
        }

        let (chat_url, model_or_url, payload_model) = if api_type.uses_url() {
            let url = non_empty_str(api_params, "url")
                .ok_or_else(|| CoreError::config(format!("api_params must include `url` for {api_type}")))?;
            if !is_valid_http_url(url) {
                return Err(CoreError::config(format!("invalid url `{url}` for {api_type}")));
            }
            (chat_completions_url(url)?, url.to_owned(), SERVER_MODEL.to_owned())
        } else {
            let model = non_empty_str(api_params, "model")
                .ok_or_else(|| CoreError::config(format!("api_params must include `model` for {api_type}")))?;
            let payload_model = match non_empty_str(api_params, "provider") {
                Some(provider) => format!("{model}:{provider}"),
                None => model.to_owned(),
            };
            let chat_url = Url::parse(SERVERLESS_CHAT_URL)
                .map_err(|e| CoreError::config(format!("invalid serverless url: {e}")))?;
            (chat_url, model.to_owned(), payload_model)
        };

        let timeout = api_params.get("timeout").map(parse_timeout).transpose()?;
        let headers = api_params
            .get("headers")
            .map(parse_headers)
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            chat_url,
            model_or_url,
            payload_model,
            timeout,
            headers,
        })
    }

    /// Full chat completion URL requests are posted to
    pub const fn chat_url(&self) -> &Url {
        &self.chat_url
    }

    /// Model id or URL the endpoint was built for, reported in reply metadata
    pub fn model_or_url(&self) -> &str {
        &self.model_or_url
    }

    /// Value of the `model` field in request bodies
    pub fn payload_model(&self) -> &str {
        &self.payload_model
    }

    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

fn non_empty_str<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Append the chat completion route unless the URL already ends with it
fn chat_completions_url(base: &str) -> std::result::Result<Url, CoreError> {
    let trimmed = base.trim_end_matches('/');

    let full = if trimmed.ends_with("/v1/chat/completions") {
        trimmed.to_owned()
    } else if trimmed.ends_with("/v1") {
        format!("{trimmed}/chat/completions")
    } else {
        format!("{trimmed}/v1/chat/completions")
    };

    Url::parse(&full).map_err(|e| CoreError::config(format!("invalid url `{base}`: {e}")))
}

fn parse_timeout(value: &Value) -> std::result::Result<Duration, CoreError> {
    value
        .as_f64()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| CoreError::config(format!("`timeout` must be a positive number of seconds, got {value}")))
}

fn parse_headers(value: &Value) -> std::result::Result<HeaderMap, CoreError> {
    let Value::Object(entries) = value else {
        return Err(CoreError::config("`headers` must be a table of strings"));
    };

    let mut headers = HeaderMap::with_capacity(entries.len());
    for (name, value) in entries {
        let value = value
            .as_str()
            .ok_or_else(|| CoreError::config(format!("header `{name}` must be a string")))?;
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| CoreError::config(format!("invalid header name `{name}`: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| CoreError::config(format!("invalid value for header `{name}`: {e}")))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

// -- Shared response handling --

/// Outcome of decoding one `data:` payload
enum Decoded {
    Event(Box<ChatCompletionStreamOutput>),
    Done,
    Skip,
}

fn decode_event(data: &str) -> Result<Decoded> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(Decoded::Skip);
    }
    if data == "[DONE]" {
        return Ok(Decoded::Done);
    }

    match serde_json::from_str::<StreamPayload>(data) {
        Ok(StreamPayload::Event(event)) => Ok(Decoded::Event(Box::new(event))),
        Ok(StreamPayload::Error(err)) => {
            let message = error_message(&err.error).unwrap_or_else(|| err.error.to_string());
            tracing::warn!(error_type = ?err.error_type, error = %message, "server reported an error mid-stream");
            Err(HfError::Stream(message))
        }
        Err(e) => {
            tracing::warn!(error = %e, data = %data, "skipping unparseable SSE payload");
            Ok(Decoded::Skip)
        }
    }
}

/// Message of an `error` field, either a bare string or `{"message": ...}`
fn error_message(error: &Value) -> Option<String> {
    match error {
        Value::String(message) => Some(message.clone()),
        Value::Object(fields) => fields.get("message").and_then(Value::as_str).map(ToOwned::to_owned),
        _ => None,
    }
}

fn parse_error_body(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| json.get("error").and_then(error_message))
        .unwrap_or_else(|| body.to_owned())
}

fn api_error(status: reqwest::StatusCode, body: &str) -> HfError {
    tracing::warn!(status = %status, "inference API returned error");
    HfError::Api {
        status: status.as_u16(),
        message: parse_error_body(body),
    }
}

// -- Blocking client --

/// Blocking chat completion client
///
/// Must not be created or dropped inside an async runtime.
#[derive(Debug)]
pub struct InferenceClient {
    http: reqwest::blocking::Client,
    endpoint: Endpoint,
    token: Option<SecretString>,
}

impl InferenceClient {
    pub fn new(endpoint: Endpoint, token: Option<SecretString>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .default_headers(endpoint.headers.clone())
            .timeout(endpoint.timeout)
            .build()?;

        Ok(Self { http, endpoint, token })
    }

    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn send(&self, request: &ChatCompletionRequest) -> Result<reqwest::blocking::Response> {
        tracing::debug!(url = %self.endpoint.chat_url, stream = request.stream, "sending chat completion request");

        let mut builder = self.http.post(self.endpoint.chat_url.clone()).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        Err(api_error(status, &body))
    }

    pub fn chat_completion(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionOutput> {
        let body = self.send(request)?.text()?;
        serde_json::from_str(&body).map_err(|e| HfError::Parse(e.to_string()))
    }

    pub fn chat_completion_stream(&self, request: &ChatCompletionRequest) -> Result<BlockingEventStream> {
        let response = self.send(request)?;
        Ok(BlockingEventStream::new(response))
    }
}

/// Size of each read from a blocking streaming response
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Body of a blocking response as a sequence of byte chunks
fn read_chunks(mut response: reqwest::blocking::Response) -> impl Iterator<Item = io::Result<Vec<u8>>> + Send {
    let mut finished = false;
    std::iter::from_fn(move || {
        if finished {
            return None;
        }

        let mut buf = vec![0; READ_CHUNK_SIZE];
        match response.read(&mut buf) {
            Ok(0) => {
                finished = true;
                None
            }
            Ok(n) => {
                buf.truncate(n);
                Some(Ok(buf))
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Some(Ok(Vec::new())),
            Err(e) => {
                finished = true;
                Some(Err(e))
            }
        }
    })
}

/// Iterator over the events of a blocking server-sent event response
///
/// Runs the body through the same event parser and decoding as the async
/// client, polled to completion on the calling thread.
pub struct BlockingEventStream {
    events: BlockingStream<EventStream>,
}

impl BlockingEventStream {
    fn new(response: reqwest::blocking::Response) -> Self {
        let events = decode_events(stream::iter(read_chunks(response)).eventsource(), |e: io::Error| {
            HfError::Stream(e.to_string())
        });

        Self {
            events: executor::block_on_stream(events),
        }
    }
}

impl fmt::Debug for BlockingEventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingEventStream").finish_non_exhaustive()
    }
}

impl Iterator for BlockingEventStream {
    type Item = Result<ChatCompletionStreamOutput>;

    fn next(&mut self) -> Option<Self::Item> {
        self.events.next()
    }
}

/// Decode parsed server-sent events into chat completion events
///
/// Ends at `[DONE]`. `transport` maps errors from the underlying byte source.
fn decode_events<S, E>(events: S, transport: fn(E) -> HfError) -> EventStream
where
    S: Stream<Item = std::result::Result<eventsource_stream::Event, EventStreamError<E>>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let events = events
        .map(move |result| match result {
            Ok(event) => decode_event(&event.data),
            Err(EventStreamError::Transport(e)) => Err(transport(e)),
            Err(e) => Err(HfError::Stream(e.to_string())),
        })
        .take_while(|decoded| future::ready(!matches!(decoded, Ok(Decoded::Done))))
        .filter_map(|decoded| {
            future::ready(match decoded {
                Ok(Decoded::Event(event)) => Some(Ok(*event)),
                Ok(Decoded::Done | Decoded::Skip) => None,
                Err(e) => Some(Err(e)),
            })
        });

    Box::pin(events)
}

// -- Async client --

/// Async chat completion client
#[derive(Debug, Clone)]
pub struct AsyncInferenceClient {
    http: reqwest::Client,
    endpoint: Endpoint,
    token: Option<SecretString>,
}

impl AsyncInferenceClient {
    pub fn new(endpoint: Endpoint, token: Option<SecretString>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().default_headers(endpoint.headers.clone());
        if let Some(timeout) = endpoint.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            endpoint,
            token,
        })
    }

    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn send(&self, request: &ChatCompletionRequest) -> Result<reqwest::Response> {
        tracing::debug!(url = %self.endpoint.chat_url, stream = request.stream, "sending chat completion request");

        let mut builder = self.http.post(self.endpoint.chat_url.clone()).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(api_error(status, &body))
    }

    pub async fn chat_completion(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionOutput> {
        let body = self.send(request).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| HfError::Parse(e.to_string()))
    }

    pub async fn chat_completion_stream(&self, request: &ChatCompletionRequest) -> Result<EventStream> {
        let response = self.send(request).await?;

        Ok(decode_events(response.bytes_stream().eventsource(), HfError::Http))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::with_recorder;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn serverless_endpoint_uses_router() {
        let endpoint = Endpoint::resolve(
            HfApiType::ServerlessInferenceApi,
            &params(json!({"model": "HuggingFaceH4/zephyr-7b-beta"})),
        )
        .unwrap();

        assert_eq!(endpoint.chat_url().as_str(), SERVERLESS_CHAT_URL);
        assert_eq!(endpoint.payload_model(), "HuggingFaceH4/zephyr-7b-beta");
        assert_eq!(endpoint.model_or_url(), "HuggingFaceH4/zephyr-7b-beta");
        assert!(endpoint.timeout().is_none());
    }

    #[test]
    fn serverless_provider_suffixes_model() {
        let endpoint = Endpoint::resolve(
            HfApiType::ServerlessInferenceApi,
            &params(json!({"model": "meta-llama/Llama-3.1-8B-Instruct", "provider": "together"})),
        )
        .unwrap();

        assert_eq!(endpoint.payload_model(), "meta-llama/Llama-3.1-8B-Instruct:together");
        assert_eq!(endpoint.model_or_url(), "meta-llama/Llama-3.1-8B-Instruct");
    }

    #[test]
    fn serverless_requires_model() {
        let err = Endpoint::resolve(HfApiType::ServerlessInferenceApi, &params(json!({"url": "http://x"}))).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
        assert!(err.to_string().contains("model"));
    }

    #[test]
    fn url_variants_require_valid_url() {
        for api_type in [HfApiType::TextGenerationInference, HfApiType::InferenceEndpoints] {
            let missing = Endpoint::resolve(api_type, &Map::new()).unwrap_err();
            assert!(missing.to_string().contains("url"));

            let invalid = Endpoint::resolve(api_type, &params(json!({"url": "not a url"}))).unwrap_err();
            assert!(matches!(invalid, CoreError::InvalidConfig(_)));

            let ftp = Endpoint::resolve(api_type, &params(json!({"url": "ftp://host/model"}))).unwrap_err();
            assert!(matches!(ftp, CoreError::InvalidConfig(_)));
        }
    }

    #[test]
    fn url_is_normalized_to_chat_route() {
        let cases = [
            ("http://localhost:8080", "http://localhost:8080/v1/chat/completions"),
            ("http://localhost:8080/", "http://localhost:8080/v1/chat/completions"),
            ("https://ep.example.cloud/v1", "https://ep.example.cloud/v1/chat/completions"),
            ("https://ep.example.cloud/v1/chat/completions", "https://ep.example.cloud/v1/chat/completions"),
        ];

        for (input, expected) in cases {
            let endpoint =
                Endpoint::resolve(HfApiType::TextGenerationInference, &params(json!({"url": input}))).unwrap();
            assert_eq!(endpoint.chat_url().as_str(), expected, "input: {input}");
            assert_eq!(endpoint.model_or_url(), input);
            assert_eq!(endpoint.payload_model(), "tgi");
        }
    }

    #[test]
    fn timeout_and_headers_are_parsed() {
        let endpoint = Endpoint::resolve(
            HfApiType::InferenceEndpoints,
            &params(json!({
                "url": "https://ep.example.cloud",
                "timeout": 2.5,
                "headers": {"x-trace": "abc"}
            })),
        )
        .unwrap();

        assert_eq!(endpoint.timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(endpoint.headers()["x-trace"], "abc");
    }

    #[test]
    fn bad_timeout_and_headers_are_rejected() {
        let base = json!({"url": "http://localhost:8080"});

        let mut negative = params(base.clone());
        negative.insert("timeout".to_owned(), json!(-1));
        assert!(Endpoint::resolve(HfApiType::TextGenerationInference, &negative).is_err());

        let mut text = params(base.clone());
        text.insert("timeout".to_owned(), json!("soon"));
        assert!(Endpoint::resolve(HfApiType::TextGenerationInference, &text).is_err());

        let mut headers = params(base);
        headers.insert("headers".to_owned(), json!({"x-n": 1}));
        assert!(Endpoint::resolve(HfApiType::TextGenerationInference, &headers).is_err());
    }

    #[test]
    fn unknown_params_are_ignored() {
        let endpoint = Endpoint::resolve(
            HfApiType::TextGenerationInference,
            &params(json!({"url": "http://localhost:8080", "retries": 3})),
        );
        assert!(endpoint.is_ok());
    }

    #[test]
    fn decode_done_and_garbage() {
        assert!(matches!(decode_event("[DONE]"), Ok(Decoded::Done)));
        assert!(matches!(decode_event(" [DONE] "), Ok(Decoded::Done)));
        assert!(matches!(decode_event("not json"), Ok(Decoded::Skip)));
        assert!(matches!(decode_event(""), Ok(Decoded::Skip)));
    }

    #[test]
    fn unparseable_payload_is_skipped_with_warning() {
        let bad_usage = r#"{"model":"tgi","choices":[],"usage":{"prompt_tokens":"many"}}"#;

        let (decoded, recorder) = with_recorder(|| decode_event(bad_usage));

        assert!(matches!(decoded, Ok(Decoded::Skip)));
        assert_eq!(recorder.warnings(), 1);
    }

    #[test]
    fn decode_event_payload() {
        let data = r#"{"model":"tgi","choices":[{"index":0,"delta":{"role":"assistant","content":"Hi"},"finish_reason":null}]}"#;
        let Ok(Decoded::Event(event)) = decode_event(data) else {
            panic!("expected an event");
        };
        assert_eq!(event.model, "tgi");
        assert_eq!(event.choices[0].delta.content.as_deref(), Some("Hi"));
    }

    #[test]
    fn decode_error_payload() {
        let err = decode_event(r#"{"error":"Input validation error","error_type":"validation"}"#)
            .err()
            .unwrap();
        assert!(matches!(err, HfError::Stream(ref m) if m == "Input validation error"));

        let err = decode_event(r#"{"error":{"message":"overloaded"}}"#).err().unwrap();
        assert!(matches!(err, HfError::Stream(ref m) if m == "overloaded"));
    }

    #[test]
    fn error_body_message_extraction() {
        assert_eq!(parse_error_body(r#"{"error":"Model is overloaded"}"#), "Model is overloaded");
        assert_eq!(parse_error_body(r#"{"error":{"message":"bad token","type":"auth"}}"#), "bad token");
        assert_eq!(parse_error_body("Bad Gateway"), "Bad Gateway");
    }
}
