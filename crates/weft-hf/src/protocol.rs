//! Hugging Face chat completion wire format
//!
//! Text Generation Inference, Inference Endpoints and the serverless router
//! all speak this `OpenAI`-compatible dialect. These structs only exist at the HTTP
//! boundary; everything past it works on `weft_core` types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// -- Request types --

/// Chat completion request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model id (serverless) or `tgi` (dedicated and self-hosted servers)
    pub model: String,
    /// Conversation messages
    pub messages: Vec<HfMessage>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    /// Stream options, only sent when streaming
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<HfTool>>,
    /// Generation parameters such as `max_tokens`, `temperature` or `stop`
    #[serde(flatten)]
    pub generation_kwargs: Map<String, Value>,
}

/// Streaming options
#[derive(Debug, Clone, Serialize)]
pub struct StreamOptions {
    /// Ask for a usage-only terminal event
    pub include_usage: bool,
}

/// Message in a request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HfMessage {
    /// Message role
    pub role: String,
    /// Text content, empty when the message only carries tool calls
    pub content: String,
    /// Participant name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool calls made by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<HfRequestToolCall>>,
    /// Tool call this message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Tool call echoed back inside an assistant message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HfRequestToolCall {
    /// Tool call identifier
    pub id: String,
    /// Always `function`
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name and decoded arguments
    pub function: HfRequestFunction,
}

/// Function part of a request tool call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HfRequestFunction {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// Tool definition offered to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HfTool {
    /// Always `function`
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function specification
    pub function: HfFunctionDefinition,
}

/// Function specification within a tool definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HfFunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: Value,
}

// -- Response types --

/// Non-streaming chat completion response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionOutput {
    /// Generated choices; some servers omit the field instead of sending `[]`
    #[serde(default)]
    pub choices: Option<Vec<OutputChoice>>,
    /// Model reported by the server
    #[serde(default)]
    pub model: Option<String>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<HfUsage>,
}

/// Choice within a non-streaming response
#[derive(Debug, Clone, Deserialize)]
pub struct OutputChoice {
    #[serde(default)]
    pub index: u32,
    pub message: OutputMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Assistant message within a choice
#[derive(Debug, Clone, Deserialize)]
pub struct OutputMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<OutputToolCall>>,
}

/// Tool call within a response message
#[derive(Debug, Clone, Deserialize)]
pub struct OutputToolCall {
    pub id: String,
    pub function: OutputFunction,
}

/// Function part of a response tool call
#[derive(Debug, Clone, Deserialize)]
pub struct OutputFunction {
    pub name: String,
    /// Either a decoded object or a JSON-encoded string, depending on the server
    #[serde(default)]
    pub arguments: Value,
}

/// Token usage
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HfUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: Option<u32>,
}

// -- Streaming types --

/// One streaming event
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionStreamOutput {
    /// Delta choices; empty on the usage-only terminal event
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub usage: Option<HfUsage>,
}

/// Choice within a streaming event
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: u32,
    pub delta: StreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental delta within a streaming choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    /// Tool call fragment; only its presence matters here
    #[serde(default)]
    pub tool_calls: Option<Value>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

/// Error object sent in place of an event
#[derive(Debug, Clone, Deserialize)]
pub struct StreamError {
    pub error: Value,
    #[serde(default)]
    pub error_type: Option<String>,
}

/// Any payload that may appear in a `data:` line
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StreamPayload {
    Error(StreamError),
    Event(ChatCompletionStreamOutput),
}
