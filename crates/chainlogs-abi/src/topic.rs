//! Indexed-value topic encoding.
//!
//! Filtering on indexed parameters always happens against the *encoded*
//! topic: a caller's value is converted to the parameter's ABI type, encoded
//! the way the EVM stores it in a topic slot, and compared byte-for-byte.
//!
//! # EVM indexed-parameter encoding rules
//! - **Value types** (uint, int, bool, address, bytes1–bytes32): ABI-encoded
//!   into exactly one 32-byte word.
//! - **`string` / `bytes`**: keccak256 of the raw contents, no length prefix
//!   and no padding.
//! - **Arrays and tuples**: keccak256 of the concatenated element encodings,
//!   each element padded to a multiple of 32 bytes.

use std::collections::BTreeMap;
use std::str::FromStr;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, FixedBytes, B256, I256, U256};
use chainlogs_core::quantity::parse_unsigned;
use chainlogs_core::TopicFilter;

use crate::error::AbiError;
use crate::fingerprint::keccak256;
use crate::shape::EventShape;
use crate::value::NormalizedValue;

// ─── Encoding ────────────────────────────────────────────────────────────────

/// Encode `value` as the topic an indexed parameter of type `ty` would carry.
///
/// An already-hashed value passes through unchanged, so values read back from
/// a decoded event can be reused as filter values.
pub fn encode_topic(value: &NormalizedValue, ty: &DynSolType) -> Result<B256, String> {
    if let NormalizedValue::Hashed(h) = value {
        return Ok(*h);
    }
    let dyn_value = to_dyn_value(value, ty)?;
    match &dyn_value {
        DynSolValue::String(s) => Ok(keccak256(s.as_bytes())),
        DynSolValue::Bytes(b) => Ok(keccak256(b)),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            let mut preimage = Vec::with_capacity(items.len() * 32);
            for item in items {
                append_in_place(&mut preimage, item);
            }
            Ok(keccak256(&preimage))
        }
        word => {
            let encoded = word.abi_encode();
            if encoded.len() != 32 {
                return Err(format!("{} does not encode to a single word", ty.sol_type_name()));
            }
            Ok(B256::from_slice(&encoded))
        }
    }
}

fn append_in_place(out: &mut Vec<u8>, value: &DynSolValue) {
    match value {
        DynSolValue::String(s) => append_padded(out, s.as_bytes()),
        DynSolValue::Bytes(b) => append_padded(out, b),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            for item in items {
                append_in_place(out, item);
            }
        }
        word => out.extend_from_slice(&word.abi_encode()),
    }
}

fn append_padded(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes);
    let rem = bytes.len() % 32;
    if rem != 0 {
        out.resize(out.len() + 32 - rem, 0);
    }
}

/// Convert a `NormalizedValue` to the alloy `DynSolValue` for the given expected type.
///
/// Beyond exact matches, the conversions callers rely on are accepted:
/// numeral strings for integers, hex strings for bytes and addresses, and
/// signed/unsigned integers across each other when the value fits.
pub fn to_dyn_value(val: &NormalizedValue, expected: &DynSolType) -> Result<DynSolValue, String> {
    match (val, expected) {
        (NormalizedValue::Bool(b), DynSolType::Bool) => Ok(DynSolValue::Bool(*b)),

        (NormalizedValue::Uint(u), DynSolType::Uint(bits)) => uint(*u, *bits),
        (NormalizedValue::Int(i), DynSolType::Uint(bits)) => {
            if i.is_negative() {
                return Err(format!("negative value {i} for uint{bits}"));
            }
            uint(i.into_raw(), *bits)
        }
        (NormalizedValue::Str(s), DynSolType::Uint(bits)) => {
            let u = parse_unsigned(s).map_err(|e| e.to_string())?;
            uint(u, *bits)
        }

        (NormalizedValue::Int(i), DynSolType::Int(bits)) => int(*i, *bits),
        (NormalizedValue::Uint(u), DynSolType::Int(bits)) => {
            let i = I256::try_from(*u).map_err(|_| format!("{u} does not fit int{bits}"))?;
            int(i, *bits)
        }
        (NormalizedValue::Str(s), DynSolType::Int(bits)) => {
            let i = I256::from_str(s).map_err(|e| format!("int parse '{s}': {e}"))?;
            int(i, *bits)
        }

        (NormalizedValue::Address(a), DynSolType::Address) => Ok(DynSolValue::Address(*a)),
        (NormalizedValue::Str(s), DynSolType::Address) => {
            let addr = Address::from_str(s).map_err(|e| format!("address parse: {e}"))?;
            Ok(DynSolValue::Address(addr))
        }

        (NormalizedValue::FixedBytes(b) | NormalizedValue::Bytes(b), DynSolType::FixedBytes(n)) => {
            fixed_bytes(b, *n)
        }
        (NormalizedValue::Str(s), DynSolType::FixedBytes(n)) => fixed_bytes(&decode_hex(s)?, *n),

        (NormalizedValue::Bytes(b) | NormalizedValue::FixedBytes(b), DynSolType::Bytes) => {
            Ok(DynSolValue::Bytes(b.clone()))
        }
        (NormalizedValue::Str(s), DynSolType::Bytes) => Ok(DynSolValue::Bytes(decode_hex(s)?)),

        (NormalizedValue::Str(s), DynSolType::String) => Ok(DynSolValue::String(s.clone())),

        (NormalizedValue::Array(elems), DynSolType::Array(inner)) => {
            let items: Result<Vec<_>, _> = elems.iter().map(|e| to_dyn_value(e, inner)).collect();
            Ok(DynSolValue::Array(items?))
        }
        (NormalizedValue::Array(elems), DynSolType::FixedArray(inner, len)) => {
            if elems.len() != *len {
                return Err(format!(
                    "fixed array length mismatch: expected {len}, got {}",
                    elems.len()
                ));
            }
            let items: Result<Vec<_>, _> = elems.iter().map(|e| to_dyn_value(e, inner)).collect();
            Ok(DynSolValue::FixedArray(items?))
        }
        (NormalizedValue::Tuple(fields), DynSolType::Tuple(types)) => {
            if fields.len() != types.len() {
                return Err(format!(
                    "tuple arity mismatch: expected {}, got {}",
                    types.len(),
                    fields.len()
                ));
            }
            let items: Result<Vec<_>, _> =
                fields.iter().zip(types).map(|(v, t)| to_dyn_value(v, t)).collect();
            Ok(DynSolValue::Tuple(items?))
        }

        _ => Err(format!("cannot convert {val} to {}", expected.sol_type_name())),
    }
}

fn uint(u: U256, bits: usize) -> Result<DynSolValue, String> {
    if u.bit_len() > bits {
        return Err(format!("{u} does not fit uint{bits}"));
    }
    Ok(DynSolValue::Uint(u, bits))
}

fn int(i: I256, bits: usize) -> Result<DynSolValue, String> {
    if bits < 256 {
        let bound = I256::from_raw(U256::from(1u8) << (bits - 1));
        if i >= bound || i < -bound {
            return Err(format!("{i} does not fit int{bits}"));
        }
    }
    Ok(DynSolValue::Int(i, bits))
}

fn fixed_bytes(b: &[u8], n: usize) -> Result<DynSolValue, String> {
    if b.len() > n {
        return Err(format!("bytes{n}: got {} bytes", b.len()));
    }
    let mut word = [0u8; 32];
    word[..b.len()].copy_from_slice(b);
    Ok(DynSolValue::FixedBytes(FixedBytes::from(word), n))
}

fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| format!("invalid hex '{s}': {e}"))
}

// ─── Indexed filters ─────────────────────────────────────────────────────────

/// Accepted values per indexed parameter name, as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedFilter {
    values: BTreeMap<String, Vec<NormalizedValue>>,
}

impl IndexedFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `value` for parameter `name` (in addition to any already given).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<NormalizedValue>) -> Self {
        self.values.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Accept any one of `values` for parameter `name`.
    pub fn with_any<V: Into<NormalizedValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.values
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[NormalizedValue])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// An [`IndexedFilter`] compiled against one event shape: accepted encoded
/// topics per topic position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicMatcher {
    positions: Vec<(usize, Vec<B256>)>,
}

impl TopicMatcher {
    /// Resolve parameter names to topic positions and encode every accepted value.
    pub fn compile(shape: &EventShape, filter: &IndexedFilter) -> Result<Self, AbiError> {
        let mut positions = Vec::new();
        for (name, values) in filter.iter() {
            let param = shape.param(name).ok_or_else(|| AbiError::UnknownParameter {
                event: shape.name.clone(),
                param: name.to_string(),
            })?;
            let position = shape
                .topic_position(name)
                .ok_or_else(|| AbiError::NotIndexed {
                    event: shape.name.clone(),
                    param: name.to_string(),
                })?;
            let topics = values
                .iter()
                .map(|v| encode_topic(v, &param.ty))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|reason| AbiError::InvalidFilterValue {
                    param: name.to_string(),
                    reason,
                })?;
            positions.push((position, topics));
        }
        positions.sort_by_key(|(pos, _)| *pos);
        Ok(Self { positions })
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Every filtered position holds one of its accepted topics.
    pub fn matches(&self, topics: &[B256]) -> bool {
        self.positions
            .iter()
            .all(|(pos, accepted)| topics.get(*pos).is_some_and(|t| accepted.contains(t)))
    }

    /// Positional topic filter for the node: the signature topic (unless
    /// anonymous) followed by the filtered positions, wildcards elsewhere.
    pub fn topic_filters(&self, shape: &EventShape) -> Vec<TopicFilter> {
        let len = self
            .positions
            .last()
            .map_or(0, |(pos, _)| pos + 1)
            .max(usize::from(!shape.anonymous));
        let mut out = vec![TopicFilter::Any; len];
        if !shape.anonymous {
            out[0] = TopicFilter::Exact(shape.topic);
        }
        for (pos, accepted) in &self.positions {
            out[*pos] = TopicFilter::from_set(accepted.clone());
        }
        out
    }
}
