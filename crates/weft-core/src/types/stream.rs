use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Meta;

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Hit the token limit
    Length,
    /// Model decided to call a tool
    ToolCalls,
    /// Content was filtered by safety systems
    ContentFilter,
    /// Turn ended after tool results were produced
    ToolCallResults,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated in the completion
    pub completion_tokens: u32,
}

impl Usage {
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    /// JSON form stored under the `usage` metadata key
    pub fn to_value(self) -> Value {
        serde_json::json!({
            "prompt_tokens": self.prompt_tokens,
            "completion_tokens": self.completion_tokens,
        })
    }
}

/// Identity of the component that emitted a chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    /// Fully qualified component type name
    #[serde(rename = "type")]
    pub component_type: String,
    /// Name of the component inside a pipeline, if it has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ComponentInfo {
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            name: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }
}

/// One incremental fragment of a streamed reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingChunk {
    /// Text fragment, possibly empty
    pub content: String,
    /// Model id, receipt time, and optionally usage or the raw finish reason
    #[serde(default)]
    pub meta: Meta,
    /// Component that produced the chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_info: Option<ComponentInfo>,
    /// Present while content is still streaming, absent on the terminal chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    /// Set only on the first chunk of a turn
    #[serde(default)]
    pub start: bool,
    /// Set only on the terminal chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl StreamingChunk {
    /// A chunk with content and metadata but no stream position
    pub fn new(content: impl Into<String>, meta: Meta) -> Self {
        Self {
            content: content.into(),
            meta,
            component_info: None,
            index: None,
            start: false,
            finish_reason: None,
        }
    }

    /// Usage reported by this chunk, if it carries a well-formed one
    pub fn usage(&self) -> Option<Usage> {
        self.meta
            .get("usage")
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn finish_reason_strings() {
        assert_eq!(FinishReason::ToolCalls.to_string(), "tool_calls");
        assert_eq!("content_filter".parse::<FinishReason>().unwrap(), FinishReason::ContentFilter);
        assert_eq!(serde_json::to_value(FinishReason::Length).unwrap(), json!("length"));
    }

    #[test]
    fn chunk_usage_ignores_null() {
        let mut meta = Meta::new();
        meta.insert("usage".to_owned(), Value::Null);
        assert_eq!(StreamingChunk::new("", meta).usage(), None);

        let mut meta = Meta::new();
        meta.insert("usage".to_owned(), Usage::new(3, 4).to_value());
        assert_eq!(StreamingChunk::new("", meta).usage(), Some(Usage::new(3, 4)));
    }
}
