use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Meta;

/// Role of a message participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatRole {
    /// System instruction
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// Tool result
    Tool,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke
    pub tool_name: String,
    /// Parsed arguments
    pub arguments: Map<String, Value>,
    /// Vendor-assigned identifier, echoed back with the tool result
    pub id: String,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, arguments: Map<String, Value>, id: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            id: id.into(),
        }
    }
}

/// Outcome of running a tool, sent back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Output of the tool
    pub result: String,
    /// The call that produced this result
    pub origin: ToolCall,
    /// Whether the tool failed
    #[serde(default)]
    pub error: bool,
}

/// A message in a conversation
///
/// Built through the role-specific constructors and read through accessors;
/// a message does not change after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    role: ChatRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_result: Option<ToolCallResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    meta: Meta,
}

impl ChatMessage {
    fn with_role(role: ChatRole) -> Self {
        Self {
            role,
            text: None,
            tool_calls: Vec::new(),
            tool_call_result: None,
            name: None,
            meta: Meta::new(),
        }
    }

    /// System instruction
    pub fn from_system(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::with_role(ChatRole::System)
        }
    }

    /// User turn
    pub fn from_user(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::with_role(ChatRole::User)
        }
    }

    /// Assistant turn, with optional text and any requested tool calls
    pub fn from_assistant(text: Option<String>, tool_calls: Vec<ToolCall>, meta: Meta) -> Self {
        Self {
            text,
            tool_calls,
            meta,
            ..Self::with_role(ChatRole::Assistant)
        }
    }

    /// Result of a tool invocation
    pub fn from_tool(result: impl Into<String>, origin: ToolCall, error: bool) -> Self {
        Self {
            tool_call_result: Some(ToolCallResult {
                result: result.into(),
                origin,
                error,
            }),
            ..Self::with_role(ChatRole::Tool)
        }
    }

    /// Attach a participant name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub const fn role(&self) -> ChatRole {
        self.role
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub const fn tool_call_result(&self) -> Option<&ToolCallResult> {
        self.tool_call_result.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub const fn meta(&self) -> &Meta {
        &self.meta
    }
}
