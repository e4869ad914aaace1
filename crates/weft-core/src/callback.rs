//! Per-chunk streaming callbacks
//!
//! A synchronous call only ever invokes a [`SyncStreamingCallback`] and an
//! asynchronous call only ever awaits an [`AsyncStreamingCallback`]. The
//! mode-erased [`StreamingCallback`] exists for component defaults, which are
//! chosen before the caller's mode is known.
//!
//! Callbacks carry a stable name. Serialized components store that name and
//! resolve it through a [`CallbackRegistry`] when restored.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::CoreError;
use crate::types::StreamingChunk;

/// Registered name of [`print_streaming_chunk`]
pub const PRINT_STREAMING_CHUNK: &str = "weft_core::print_streaming_chunk";

/// Registered name of [`print_streaming_chunk_async`]
pub const PRINT_STREAMING_CHUNK_ASYNC: &str = "weft_core::print_streaming_chunk_async";

type SyncFn = dyn Fn(&StreamingChunk) + Send + Sync;
type AsyncFn = dyn Fn(StreamingChunk) -> BoxFuture<'static, ()> + Send + Sync;

/// Callback invoked directly for every chunk of a blocking call
#[derive(Clone)]
pub struct SyncStreamingCallback {
    name: String,
    func: Arc<SyncFn>,
}

impl SyncStreamingCallback {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&StreamingChunk) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, chunk: &StreamingChunk) {
        (self.func)(chunk);
    }
}

impl fmt::Debug for SyncStreamingCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncStreamingCallback")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Callback awaited for every chunk of an async call
#[derive(Clone)]
pub struct AsyncStreamingCallback {
    name: String,
    func: Arc<AsyncFn>,
}

impl AsyncStreamingCallback {
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(StreamingChunk) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(move |chunk| Box::pin(func(chunk))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn call(&self, chunk: StreamingChunk) {
        (self.func)(chunk).await;
    }
}

impl fmt::Debug for AsyncStreamingCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncStreamingCallback")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A callback of either mode, as stored in a component's defaults
#[derive(Debug, Clone)]
pub enum StreamingCallback {
    Sync(SyncStreamingCallback),
    Async(AsyncStreamingCallback),
}

impl StreamingCallback {
    pub fn name(&self) -> &str {
        match self {
            Self::Sync(cb) => cb.name(),
            Self::Async(cb) => cb.name(),
        }
    }

    pub const fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl From<SyncStreamingCallback> for StreamingCallback {
    fn from(cb: SyncStreamingCallback) -> Self {
        Self::Sync(cb)
    }
}

impl From<AsyncStreamingCallback> for StreamingCallback {
    fn from(cb: AsyncStreamingCallback) -> Self {
        Self::Async(cb)
    }
}

/// Pick the callback for a blocking call
///
/// The call-time callback wins. Otherwise the component default is used and
/// must itself be synchronous.
pub fn select_sync_callback(
    default: Option<&StreamingCallback>,
    runtime: Option<SyncStreamingCallback>,
) -> Result<Option<SyncStreamingCallback>, CoreError> {
    if runtime.is_some() {
        return Ok(runtime);
    }

    match default {
        None => Ok(None),
        Some(StreamingCallback::Sync(cb)) => Ok(Some(cb.clone())),
        Some(StreamingCallback::Async(cb)) => Err(CoreError::config(format!(
            "streaming callback `{}` is async and cannot be used in a synchronous call",
            cb.name()
        ))),
    }
}

/// Pick the callback for an async call
///
/// The call-time callback wins. Otherwise the component default is used and
/// must itself be async.
pub fn select_async_callback(
    default: Option<&StreamingCallback>,
    runtime: Option<AsyncStreamingCallback>,
) -> Result<Option<AsyncStreamingCallback>, CoreError> {
    if runtime.is_some() {
        return Ok(runtime);
    }

    match default {
        None => Ok(None),
        Some(StreamingCallback::Async(cb)) => Ok(Some(cb.clone())),
        Some(StreamingCallback::Sync(cb)) => Err(CoreError::config(format!(
            "streaming callback `{}` is synchronous and cannot be used in an async call",
            cb.name()
        ))),
    }
}

fn write_chunk(chunk: &StreamingChunk) {
    let mut out = std::io::stdout().lock();
    write!(out, "{}", chunk.content).ok();
    if chunk.finish_reason.is_some() {
        writeln!(out).ok();
    }
    out.flush().ok();
}

/// Callback that echoes chunk content to stdout as it arrives
pub fn print_streaming_chunk() -> SyncStreamingCallback {
    SyncStreamingCallback::new(PRINT_STREAMING_CHUNK, write_chunk)
}

/// Async twin of [`print_streaming_chunk`]
pub fn print_streaming_chunk_async() -> AsyncStreamingCallback {
    AsyncStreamingCallback::new(PRINT_STREAMING_CHUNK_ASYNC, |chunk: StreamingChunk| async move {
        write_chunk(&chunk);
    })
}

/// Name-to-callback table used to restore serialized components
#[derive(Debug, Clone, Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<String, StreamingCallback>,
}

impl CallbackRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the stdout printers
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(print_streaming_chunk());
        registry.register(print_streaming_chunk_async());
        registry
    }

    /// Register a callback under its own name, returning any callback it replaced
    pub fn register(&mut self, callback: impl Into<StreamingCallback>) -> Option<StreamingCallback> {
        let callback = callback.into();
        let replaced = self.callbacks.insert(callback.name().to_owned(), callback);
        if let Some(previous) = &replaced {
            tracing::debug!(callback = %previous.name(), "replaced registered streaming callback");
        }
        replaced
    }

    /// Look up a callback by its serialized name
    pub fn resolve(&self, name: &str) -> Result<StreamingCallback, CoreError> {
        self.callbacks
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::deserialization(format!("no streaming callback registered as `{name}`")))
    }
}
