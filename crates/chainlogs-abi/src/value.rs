//! Decoded event values.
//!
//! `NormalizedValue` is what callers see in a decoded event and what they
//! pass as indexed filter values. Integers keep their full 256-bit range.

use std::fmt;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, B256, I256, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum NormalizedValue {
    Uint(U256),
    Int(I256),
    Bool(bool),
    Address(Address),
    /// `bytes1` .. `bytes32`, exactly as many bytes as the type declares.
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    Str(String),
    Array(Vec<NormalizedValue>),
    Tuple(Vec<NormalizedValue>),
    /// keccak256 of an indexed reference-type value; the original is not
    /// recoverable from the log.
    Hashed(B256),
}

impl NormalizedValue {
    pub fn as_u256(&self) -> Option<U256> {
        match self {
            Self::Uint(v) => Some(*v),
            Self::Int(v) if !v.is_negative() => Some(v.into_raw()),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<B256> {
        match self {
            Self::Hashed(h) => Some(*h),
            _ => None,
        }
    }

    pub fn is_hashed(&self) -> bool {
        matches!(self, Self::Hashed(_))
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Address(a) => write!(f, "{a}"),
            Self::FixedBytes(b) | Self::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Self::Str(s) => write!(f, "{s}"),
            Self::Hashed(h) => write!(f, "{h:#x}"),
            Self::Array(items) | Self::Tuple(items) => {
                let (open, close) = if matches!(self, Self::Array(_)) { ("[", "]") } else { ("(", ")") };
                f.write_str(open)?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(close)
            }
        }
    }
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for NormalizedValue {
            fn from(v: $t) -> Self {
                Self::Uint(U256::from(v))
            }
        })*
    };
}

macro_rules! from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for NormalizedValue {
            fn from(v: $t) -> Self {
                Self::Int(widen(v as i128))
            }
        })*
    };
}

fn widen(v: i128) -> I256 {
    let magnitude = I256::from_raw(U256::from(v.unsigned_abs()));
    if v < 0 {
        -magnitude
    } else {
        magnitude
    }
}

from_unsigned!(u8, u16, u32, u64, u128, usize);
from_signed!(i8, i16, i32, i64, i128, isize);

impl From<U256> for NormalizedValue {
    fn from(v: U256) -> Self {
        Self::Uint(v)
    }
}

impl From<I256> for NormalizedValue {
    fn from(v: I256) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for NormalizedValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Address> for NormalizedValue {
    fn from(v: Address) -> Self {
        Self::Address(v)
    }
}

impl From<B256> for NormalizedValue {
    fn from(v: B256) -> Self {
        Self::FixedBytes(v.to_vec())
    }
}

impl From<&str> for NormalizedValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for NormalizedValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<u8>> for NormalizedValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

/// Convert a decoded `DynSolValue` into a `NormalizedValue`.
pub fn normalize(val: DynSolValue) -> NormalizedValue {
    match val {
        DynSolValue::Bool(b) => NormalizedValue::Bool(b),
        DynSolValue::Int(i, _) => NormalizedValue::Int(i),
        DynSolValue::Uint(u, _) => NormalizedValue::Uint(u),
        DynSolValue::FixedBytes(word, size) => NormalizedValue::FixedBytes(word[..size].to_vec()),
        DynSolValue::Bytes(b) => NormalizedValue::Bytes(b),
        DynSolValue::String(s) => NormalizedValue::Str(s),
        DynSolValue::Address(a) => NormalizedValue::Address(a),
        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) => {
            NormalizedValue::Array(vals.into_iter().map(normalize).collect())
        }
        DynSolValue::Tuple(fields) => {
            NormalizedValue::Tuple(fields.into_iter().map(normalize).collect())
        }
        // function pointers: address ++ selector
        DynSolValue::Function(f) => NormalizedValue::FixedBytes(f.to_vec()),
        #[allow(unreachable_patterns)]
        other => NormalizedValue::Bytes(other.abi_encode()),
    }
}
