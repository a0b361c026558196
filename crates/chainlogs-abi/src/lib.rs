//! chainlogs-abi: event shapes, topic index and log decoding.
//!
//! Uses alloy-rs (`alloy-dyn-abi`, `alloy-json-abi`) for type resolution and
//! ABI decoding, and `tiny-keccak` for signature topics.
//!
//! # Indexed vs non-indexed parameters
//! An EVM log stores indexed parameters in `topics[1..]` (or `topics[0..]`
//! for anonymous events) and everything else ABI-encoded in `data`.
//! Indexed reference types (`string`, `bytes`, arrays, tuples) are stored as
//! their keccak256 hash and decode to [`NormalizedValue::Hashed`].

pub mod decoder;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod shape;
pub mod topic;
pub mod value;

pub use decoder::{decode_as, decode_log, decode_ordered, Decoded, EventDecoder, EventLog, ReturnValues};
pub use error::AbiError;
pub use index::TopicIndex;
pub use shape::{EventParamShape, EventShape};
pub use topic::{encode_topic, IndexedFilter, TopicMatcher};
pub use value::NormalizedValue;
