//! Folding a streamed turn into one assistant message

use serde_json::Value;

use crate::types::{ChatMessage, Meta, StreamingChunk};

/// Collects the chunks of one streamed turn
///
/// Translators read [`StreamAccumulator::chunks`] to learn whether a chunk is
/// the first of its turn. Once the vendor stream ends, [`StreamAccumulator::finish`]
/// folds everything into the reply.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    chunks: Vec<StreamingChunk>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks received so far this turn
    pub fn chunks(&self) -> &[StreamingChunk] {
        &self.chunks
    }

    pub fn push(&mut self, chunk: StreamingChunk) {
        self.chunks.push(chunk);
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Fold the turn into its final message
    pub fn finish(self) -> ChatMessage {
        convert_streaming_chunks_to_chat_message(&self.chunks)
    }
}

/// Fold an ordered run of chunks into one assistant message
///
/// Text is the in-order concatenation of chunk contents. Usage comes from the
/// last chunk that reported one, or is zero if none did. Tool calls are never
/// produced on this path.
pub fn convert_streaming_chunks_to_chat_message(chunks: &[StreamingChunk]) -> ChatMessage {
    let text: String = chunks.iter().map(|chunk| chunk.content.as_str()).collect();

    let finish_reason = chunks.iter().rev().find_map(|chunk| chunk.finish_reason);
    let usage = chunks.iter().rev().find_map(StreamingChunk::usage).unwrap_or_default();

    let model = chunks
        .last()
        .and_then(|chunk| chunk.meta.get("model"))
        .cloned()
        .unwrap_or(Value::Null);
    let completion_start_time = chunks
        .first()
        .and_then(|chunk| chunk.meta.get("received_at"))
        .cloned()
        .unwrap_or(Value::Null);

    let mut meta = Meta::new();
    meta.insert("model".to_owned(), model);
    meta.insert("index".to_owned(), Value::from(0));
    meta.insert(
        "finish_reason".to_owned(),
        finish_reason.map_or(Value::Null, |reason| Value::String(reason.to_string())),
    );
    meta.insert("completion_start_time".to_owned(), completion_start_time);
    meta.insert("usage".to_owned(), usage.to_value());

    let text = (!text.is_empty()).then_some(text);
    ChatMessage::from_assistant(text, Vec::new(), meta)
}
