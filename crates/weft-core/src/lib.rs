//! Core building blocks shared by weft components
//!
//! Holds the provider-agnostic chat data model, the component serialization
//! contract, streaming callbacks, credentials, and the fold that turns a
//! stream of chunks into one assistant message.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod accumulate;
pub mod callback;
pub mod component;
pub mod error;
pub mod http_url;
pub mod secret;
pub mod tool;
pub mod types;

pub use accumulate::{StreamAccumulator, convert_streaming_chunks_to_chat_message};
pub use callback::{
    AsyncStreamingCallback, CallbackRegistry, StreamingCallback, SyncStreamingCallback, print_streaming_chunk,
    print_streaming_chunk_async, select_async_callback, select_sync_callback,
};
pub use component::{Component, default_from_dict, default_to_dict};
pub use error::CoreError;
pub use http_url::is_valid_http_url;
pub use secret::Secret;
pub use tool::{Tool, Tools, Toolset, check_duplicate_tool_names};
pub use types::{
    ChatMessage, ChatRole, ComponentInfo, FinishReason, Meta, StreamingChunk, ToolCall, ToolCallResult, Usage,
};
