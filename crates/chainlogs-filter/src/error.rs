//! Errors surfaced by filter, subscription and event operations.

use chainlogs_abi::AbiError;
use chainlogs_core::{FilterId, FilterKind, JsonRpcError, QuantityError, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    /// Negative or unparsable numeric input. No RPC was sent.
    #[error("Invalid numeric input '{input}': {reason}")]
    InvalidNumericInput { input: String, reason: String },

    #[error("Numeric overflow: {value} does not fit in {target}")]
    NumericOverflow { value: String, target: &'static str },

    /// Live delivery requested over a transport without push support.
    #[error("Transport {transport} does not support subscriptions")]
    UnsupportedTransport { transport: String },

    /// The node rejected the request; code and message are the node's own.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Transport error: {0}")]
    Transport(TransportError),

    /// The node no longer knows this filter (expired, uninstalled or never created).
    #[error("Filter {id} not found")]
    FilterNotFound { id: FilterId },

    #[error("Filter {id} is already being polled")]
    ConcurrentPollRejected { id: FilterId },

    #[error("Filter creation rejected ({code}): {message}")]
    CreationRejected { code: i64, message: String },

    #[error("Unknown event '{name}'")]
    UnknownEvent { name: String },

    #[error("Filter {id} is a {actual} filter, expected {expected}")]
    KindMismatch {
        id: FilterId,
        expected: &'static str,
        actual: FilterKind,
    },

    /// The node answered with a payload of the wrong shape.
    #[error("Invalid response to {method}: {reason}")]
    InvalidResponse { method: String, reason: String },

    #[error(transparent)]
    Abi(#[from] AbiError),
}

impl FilterError {
    /// Returns `true` if the error ended the stream or operation because of
    /// the connection rather than the request.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub(crate) fn invalid_response(method: &str, reason: impl ToString) -> Self {
        Self::InvalidResponse {
            method: method.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<TransportError> for FilterError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Rpc(JsonRpcError { code, message, .. }) => Self::Rpc { code, message },
            other => Self::Transport(other),
        }
    }
}

impl From<QuantityError> for FilterError {
    fn from(err: QuantityError) -> Self {
        match err {
            QuantityError::InvalidNumericInput { input, reason } => {
                Self::InvalidNumericInput { input, reason }
            }
            QuantityError::NumericOverflow { value, target } => Self::NumericOverflow { value, target },
        }
    }
}

/// Whether a node error means "no such filter".
///
/// Nodes report this as a generic server error; the message is the only
/// reliable signal.
pub(crate) fn is_filter_not_found(err: &JsonRpcError) -> bool {
    err.message.to_ascii_lowercase().contains("filter not found")
}
