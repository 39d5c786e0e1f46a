//! Error types for a3s-chat

use thiserror::Error;

/// Errors that can occur in the chat client
#[derive(Debug, Error)]
pub enum ChatError {
    /// Malformed or unrecognized inbound frame
    ///
    /// Dropped by the session without touching conversation state.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Transport connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// The channel was closed and will not reopen
    #[error("Channel closed")]
    Closed,

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Reasoning ticker invariant violation
    #[error("Ticker error: {0}")]
    Ticker(String),

    /// A reply is still streaming
    #[error("Reply in progress: {0}")]
    Busy(String),

    /// Rejected local input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Agent API request failure
    #[error("API error for '{endpoint}': {reason}")]
    Api {
        endpoint: String,
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChatError {
    /// Whether the error is a transport-level failure
    ///
    /// Transport failures surface as connection status changes, never as
    /// conversation turns.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ChatError::Connection(_) | ChatError::Closed | ChatError::Timeout(_)
        )
    }
}

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;
