//! Error types for ABI loading, topic encoding and log decoding.

use thiserror::Error;

/// Errors raised while loading event shapes or decoding logs against them.
#[derive(Debug, Error)]
pub enum AbiError {
    #[error("Invalid ABI JSON: {reason}")]
    InvalidAbi { reason: String },

    #[error("Cannot resolve type of parameter '{param}' in event {event}: {reason}")]
    UnresolvedType {
        event: String,
        param: String,
        reason: String,
    },

    #[error("ABI decode failed: {reason}")]
    AbiDecodeFailed { reason: String },

    #[error("Malformed log: {reason}")]
    MalformedLog { reason: String },

    #[error("Invalid filter value for '{param}': {reason}")]
    InvalidFilterValue { param: String, reason: String },

    #[error("Event {event} has no parameter named '{param}'")]
    UnknownParameter { event: String, param: String },

    #[error("Parameter '{param}' of event {event} is not indexed")]
    NotIndexed { event: String, param: String },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
