//! Error types for jsonwire-client.

use thiserror::Error;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// I/O error on the socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Outbound packet did not serialize to a JSON object.
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    /// No response arrived before the request timeout.
    #[error("Response timeout for request {sq}")]
    Timeout {
        /// Sequence number of the request that expired.
        sq: u32,
    },

    /// Every sequence number is held by an outstanding request.
    #[error("No free sequence number (limit {max})")]
    SequenceExhausted {
        /// Configured wrap boundary.
        max: u32,
    },

    /// Handler not found for the given action.
    #[error("Handler not found for action: {0}")]
    HandlerNotFound(String),

    /// Connection or client closed.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;
