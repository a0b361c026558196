//! `EventDecoder`: turns raw logs into typed event records.

use std::sync::Arc;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::B256;
use chainlogs_core::RawLog;
use rayon::prelude::*;

use crate::error::AbiError;
use crate::index::TopicIndex;
use crate::shape::{display_name, EventShape};
use crate::topic::TopicMatcher;
use crate::value::{normalize, NormalizedValue};

/// Decoded parameters, addressable by name and by declaration position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReturnValues(Vec<(String, NormalizedValue)>);

impl ReturnValues {
    /// Value of the parameter called `name`. Unnamed parameters are only
    /// reachable through [`ReturnValues::at`].
    pub fn get(&self, name: &str) -> Option<&NormalizedValue> {
        if name.is_empty() {
            return None;
        }
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn at(&self, position: usize) -> Option<&NormalizedValue> {
        self.0.get(position).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NormalizedValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// A log decoded against an event shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    pub event: String,
    /// Signature topic; `None` for anonymous events.
    pub signature: Option<B256>,
    pub return_values: ReturnValues,
    pub raw: RawLog,
}

impl EventLog {
    /// The log was retracted by a chain reorganization.
    pub fn is_removed(&self) -> bool {
        self.raw.removed
    }
}

/// Outcome of decoding one log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Event(EventLog),
    /// Excluded by an indexed-value filter.
    FilterMismatch,
    /// No known event shape carries this log's signature topic.
    NotFound,
}

impl Decoded {
    pub fn into_event(self) -> Option<EventLog> {
        match self {
            Self::Event(e) => Some(e),
            _ => None,
        }
    }
}

/// Decoder over one contract's topic index.
/// Thread-safe, cheap to clone.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    index: Arc<TopicIndex>,
}

impl EventDecoder {
    pub fn new(index: Arc<TopicIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &TopicIndex {
        &self.index
    }

    /// Decode a log using whichever shape its topic 0 resolves to.
    pub fn decode(&self, raw: &RawLog, matcher: Option<&TopicMatcher>) -> Result<Decoded, AbiError> {
        let shape = match raw.topic0().and_then(|t| self.index.resolve(t)) {
            Some(shape) => shape,
            None => return Ok(Decoded::NotFound),
        };
        decode_as(shape, raw, matcher)
    }

    /// Decode a batch, preserving order. Batches of at least
    /// `parallel_threshold` logs are decoded on the rayon pool.
    pub fn decode_batch(
        &self,
        logs: &[RawLog],
        matcher: Option<&TopicMatcher>,
        parallel_threshold: usize,
    ) -> Vec<Result<Decoded, AbiError>> {
        decode_ordered(logs, parallel_threshold, |raw| self.decode(raw, matcher))
    }
}

/// Apply `decode` to every log in order, on the rayon pool once the batch
/// reaches `parallel_threshold`.
pub fn decode_ordered<T, F>(logs: &[RawLog], parallel_threshold: usize, decode: F) -> Vec<T>
where
    T: Send,
    F: Fn(&RawLog) -> T + Sync + Send,
{
    if logs.len() >= parallel_threshold {
        logs.par_iter().map(decode).collect()
    } else {
        logs.iter().map(decode).collect()
    }
}

/// Decode a log against one specific shape.
///
/// A non-anonymous shape only accepts logs whose topic 0 is its signature
/// topic; anything else is [`Decoded::NotFound`].
pub fn decode_as(
    shape: &EventShape,
    raw: &RawLog,
    matcher: Option<&TopicMatcher>,
) -> Result<Decoded, AbiError> {
    if !shape.anonymous && raw.topic0() != Some(&shape.topic) {
        return Ok(Decoded::NotFound);
    }
    if let Some(matcher) = matcher {
        if !matcher.matches(&raw.topics) {
            return Ok(Decoded::FilterMismatch);
        }
    }
    decode_log(shape, raw).map(Decoded::Event)
}

/// Decode every parameter of `shape` from `raw`, without any filtering.
pub fn decode_log(shape: &EventShape, raw: &RawLog) -> Result<EventLog, AbiError> {
    if raw.topics.len() < shape.topic_count() {
        return Err(AbiError::MalformedLog {
            reason: format!(
                "{} expects {} topics, log has {}",
                shape.signature,
                shape.topic_count(),
                raw.topics.len()
            ),
        });
    }

    let mut data_values = decode_data(shape, &raw.data)?.into_iter();
    let mut indexed = shape.indexed_params().map(|(pos, _)| pos);
    let mut values = Vec::with_capacity(shape.params.len());

    for (i, param) in shape.params.iter().enumerate() {
        let value = if param.indexed {
            // topic_count() guarantees every indexed position exists
            let topic = indexed
                .next()
                .and_then(|pos| raw.topics.get(pos))
                .ok_or_else(|| AbiError::MalformedLog {
                    reason: format!("missing topic for '{}'", display_name(&param.name, i)),
                })?;
            decode_topic(topic, &param.ty).map_err(|reason| AbiError::AbiDecodeFailed {
                reason: format!("topic for '{}': {reason}", display_name(&param.name, i)),
            })?
        } else {
            data_values.next().ok_or_else(|| AbiError::AbiDecodeFailed {
                reason: format!("data ended before '{}'", display_name(&param.name, i)),
            })?
        };
        values.push((param.name.clone(), value));
    }

    Ok(EventLog {
        event: shape.name.clone(),
        signature: (!shape.anonymous).then_some(shape.topic),
        return_values: ReturnValues(values),
        raw: raw.clone(),
    })
}

/// Decode a single indexed topic (always 32 bytes).
///
/// Reference types are stored as their keccak256 hash in an indexed position;
/// the original value is unrecoverable, so the hash itself is returned.
fn decode_topic(topic: &B256, ty: &DynSolType) -> Result<NormalizedValue, String> {
    if crate::shape::is_reference_type(ty) {
        return Ok(NormalizedValue::Hashed(*topic));
    }
    ty.abi_decode(topic.as_slice())
        .map(normalize)
        .map_err(|e| e.to_string())
}

/// Decode the non-indexed parameters from the data payload, in declaration order.
fn decode_data(shape: &EventShape, data: &[u8]) -> Result<Vec<NormalizedValue>, AbiError> {
    let types: Vec<DynSolType> = shape.data_params().map(|p| p.ty.clone()).collect();
    if types.is_empty() {
        return Ok(Vec::new());
    }

    let decoded = DynSolType::Tuple(types)
        .abi_decode_sequence(data)
        .map_err(|e| AbiError::AbiDecodeFailed {
            reason: format!("{} data: {e}", shape.signature),
        })?;

    Ok(match decoded {
        DynSolValue::Tuple(vals) => vals.into_iter().map(normalize).collect(),
        other => vec![normalize(other)],
    })
}
