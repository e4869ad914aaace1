use thiserror::Error;
use weft_core::CoreError;

/// Result type for generator operations
pub type Result<T> = std::result::Result<T, HfError>;

/// Errors from the Hugging Face chat generator
#[derive(Debug, Error)]
pub enum HfError {
    /// Invalid construction parameters or call arguments
    #[error(transparent)]
    Config(#[from] CoreError),

    /// HTTP transport error, passed through unchanged
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("inference API returned {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message extracted from the body
        message: String,
    },

    /// Response body could not be decoded
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Server reported an error in the middle of a stream
    #[error("stream error: {0}")]
    Stream(String),
}

impl HfError {
    /// Whether the error was raised before any request was sent
    ///
    /// Configuration errors are never worth retrying; everything else comes
    /// from the transport or the server.
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(CoreError::config(message))
    }
}
