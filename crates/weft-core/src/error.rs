use thiserror::Error;

/// Errors raised by the shared component layer
#[derive(Debug, Error)]
pub enum CoreError {
    /// A construction parameter or call argument is invalid
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A chat message cannot be sent in its current shape
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A serialized component or value could not be restored
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl CoreError {
    /// Shorthand for an [`CoreError::InvalidConfig`] from any displayable value
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Shorthand for a [`CoreError::Deserialization`] from any displayable value
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }
}
