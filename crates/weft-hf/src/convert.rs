//! Conversion between `weft_core` types and the Hugging Face wire format
//!
//! Vendor-data anomalies (unparseable tool arguments, unknown finish reasons)
//! are recovered here: the offending piece is logged and dropped or mapped to
//! a default, and the call carries on.

use serde_json::{Map, Value};
use weft_core::{ChatMessage, ComponentInfo, CoreError, FinishReason, Meta, StreamingChunk, ToolCall, Tools, Usage};

use crate::protocol::{
    ChatCompletionStreamOutput, HfFunctionDefinition, HfMessage, HfRequestFunction, HfRequestToolCall, HfTool,
    HfUsage, OutputToolCall, StreamChoice,
};

// -- Finish reasons --

/// Map a vendor stop signal to the shared finish reason
///
/// Any tool-call evidence in the same event wins over the literal signal.
/// `length` maps to [`FinishReason::Length`]; `eos_token`, `stop_sequence`
/// and anything unrecognized map to [`FinishReason::Stop`].
pub fn map_finish_reason(finish_reason: Option<&str>, has_tool_calls: bool) -> Option<FinishReason> {
    let reason = finish_reason?;

    if has_tool_calls {
        return Some(FinishReason::ToolCalls);
    }

    match reason {
        "length" => Some(FinishReason::Length),
        "eos_token" | "stop_sequence" => Some(FinishReason::Stop),
        other => {
            tracing::warn!(finish_reason = %other, "unrecognized finish reason, treating as stop");
            Some(FinishReason::Stop)
        }
    }
}

/// Finish reason of a streaming choice, looking at its delta for tool-call evidence
pub fn stream_choice_finish_reason(choice: &StreamChoice) -> Option<FinishReason> {
    let has_tool_calls = choice.delta.tool_calls.is_some() || choice.delta.tool_call_id.is_some();
    map_finish_reason(choice.finish_reason.as_deref(), has_tool_calls)
}

// -- Tool calls --

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decode the arguments of one vendor tool call, or explain why not
fn parse_tool_arguments(tool_call: &OutputToolCall) -> Option<Map<String, Value>> {
    let id = &tool_call.id;
    let name = &tool_call.function.name;

    match &tool_call.function.arguments {
        Value::Object(arguments) => Some(arguments.clone()),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(arguments)) => Some(arguments),
            Ok(other) => {
                tracing::warn!(
                    tool_call_id = %id,
                    tool_name = %name,
                    arguments = %raw,
                    decoded_type = json_type_name(&other),
                    "tool call arguments did not decode to an object, skipping tool call"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    tool_call_id = %id,
                    tool_name = %name,
                    arguments = %raw,
                    error = %e,
                    "malformed JSON in tool call arguments, skipping tool call"
                );
                None
            }
        },
        other => {
            tracing::warn!(
                tool_call_id = %id,
                tool_name = %name,
                arguments = %other,
                arguments_type = json_type_name(other),
                "tool call arguments must be an object or a JSON string, skipping tool call"
            );
            None
        }
    }
}

/// Normalize vendor tool calls, keeping order and dropping unusable ones
///
/// A call is dropped when its arguments cannot be decoded into an object or
/// decode to an empty object. Never fails.
pub fn convert_tool_calls(tool_calls: Option<&[OutputToolCall]>) -> Vec<ToolCall> {
    let Some(tool_calls) = tool_calls else {
        return Vec::new();
    };

    tool_calls
        .iter()
        .filter_map(|tool_call| {
            let arguments = parse_tool_arguments(tool_call)?;
            if arguments.is_empty() {
                tracing::debug!(
                    tool_call_id = %tool_call.id,
                    tool_name = %tool_call.function.name,
                    "tool call has empty arguments, skipping tool call"
                );
                return None;
            }
            Some(ToolCall::new(
                tool_call.function.name.clone(),
                arguments,
                tool_call.id.clone(),
            ))
        })
        .collect()
}

// -- Streaming --

/// Usage as stored in message and chunk metadata
pub fn usage_or_zero(usage: Option<&HfUsage>) -> Value {
    usage
        .map_or_else(Usage::default, |u| Usage::new(u.prompt_tokens, u.completion_tokens))
        .to_value()
}

fn received_at() -> Value {
    Value::String(jiff::Timestamp::now().to_string())
}

/// Translate one vendor streaming event into a chunk
///
/// `previous_chunks` are the chunks already produced this turn; the first
/// chunk of a turn is flagged with `start`. An event without choices is the
/// vendor's usage-only terminal event and becomes an empty chunk carrying the
/// usage (or `null`).
pub fn convert_stream_output(
    event: &ChatCompletionStreamOutput,
    previous_chunks: &[StreamingChunk],
    component_info: Option<&ComponentInfo>,
) -> StreamingChunk {
    let mut meta = Meta::new();
    meta.insert("model".to_owned(), Value::String(event.model.clone()));
    meta.insert("received_at".to_owned(), received_at());

    // Only one completion is ever requested, so the first choice is the only one
    let Some(choice) = event.choices.first() else {
        let usage = event
            .usage
            .as_ref()
            .map_or(Value::Null, |u| usage_or_zero(Some(u)));
        meta.insert("usage".to_owned(), usage);

        return StreamingChunk {
            component_info: component_info.cloned(),
            ..StreamingChunk::new("", meta)
        };
    };

    meta.insert(
        "finish_reason".to_owned(),
        choice
            .finish_reason
            .as_ref()
            .map_or(Value::Null, |r| Value::String(r.clone())),
    );

    StreamingChunk {
        content: choice.delta.content.clone().unwrap_or_default(),
        meta,
        component_info: component_info.cloned(),
        index: choice.finish_reason.is_none().then_some(0),
        start: previous_chunks.is_empty(),
        finish_reason: stream_choice_finish_reason(choice),
    }
}

// -- Outbound --

/// Convert a chat message to the vendor request format
pub fn convert_message(message: &ChatMessage) -> Result<HfMessage, CoreError> {
    let text = message.text();
    let tool_calls = message.tool_calls();
    let tool_call_result = message.tool_call_result();

    if text.is_none() && tool_calls.is_empty() && tool_call_result.is_none() {
        return Err(CoreError::InvalidMessage(
            "a chat message must contain text, tool calls, or a tool call result".to_owned(),
        ));
    }

    let mut hf_message = HfMessage {
        role: message.role().to_string(),
        content: String::new(),
        name: message.name().map(ToOwned::to_owned),
        tool_calls: None,
        tool_call_id: None,
    };

    if let Some(result) = tool_call_result {
        if text.is_some() {
            return Err(CoreError::InvalidMessage(
                "a chat message cannot contain both a tool call result and text".to_owned(),
            ));
        }
        hf_message.content.clone_from(&result.result);
        hf_message.tool_call_id = Some(result.origin.id.clone());
        return Ok(hf_message);
    }

    if let Some(text) = text {
        hf_message.content = text.to_owned();
    }

    if !tool_calls.is_empty() {
        hf_message.tool_calls = Some(
            tool_calls
                .iter()
                .map(|tc| HfRequestToolCall {
                    id: tc.id.clone(),
                    tool_type: "function".to_owned(),
                    function: HfRequestFunction {
                        name: tc.tool_name.clone(),
                        arguments: tc.arguments.clone(),
                    },
                })
                .collect(),
        );
    }

    Ok(hf_message)
}

/// Convert tools to vendor tool definitions; `None` when there are none
pub fn convert_tools(tools: Option<&Tools>) -> Option<Vec<HfTool>> {
    let tools = tools.filter(|t| !t.is_empty())?;

    Some(
        tools
            .as_slice()
            .iter()
            .map(|tool| HfTool {
                tool_type: "function".to_owned(),
                function: HfFunctionDefinition {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                },
            })
            .collect(),
    )
}
