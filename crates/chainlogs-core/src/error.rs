//! Transport-level and numeric conversion error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur during an RPC transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, reset, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The persistent connection was closed by either side.
    #[error("Connection closed")]
    Closed,

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is transient at the connection level.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::WebSocket(_) | Self::Timeout { .. } | Self::Closed
        )
    }

    /// Returns `true` if this is a node-side rejection (not retryable).
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }

    /// Returns the node error object if the node rejected the request.
    pub fn as_rpc(&self) -> Option<&JsonRpcError> {
        match self {
            Self::Rpc(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors produced while converting numeric values to or from wire form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// Negative, unparsable or out-of-range input. Raised before any RPC is sent.
    #[error("invalid numeric input '{input}': {reason}")]
    InvalidNumericInput { input: String, reason: String },

    /// A wire value does not fit the requested native output format.
    #[error("numeric overflow: {value} does not fit in {target}")]
    NumericOverflow { value: String, target: &'static str },
}

impl QuantityError {
    pub(crate) fn invalid(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNumericInput {
            input: input.into(),
            reason: reason.into(),
        }
    }
}
