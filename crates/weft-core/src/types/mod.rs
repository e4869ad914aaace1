//! Canonical chat types exchanged between components
//!
//! These types are vendor-agnostic. Each component converts its vendor's wire
//! format into them and back.

pub mod message;
pub mod stream;

pub use message::{ChatMessage, ChatRole, ToolCall, ToolCallResult};
pub use stream::{ComponentInfo, FinishReason, StreamingChunk, Usage};

/// Free-form metadata attached to messages and chunks
pub type Meta = serde_json::Map<String, serde_json::Value>;
