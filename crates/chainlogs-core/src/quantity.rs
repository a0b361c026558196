//! Numeric/format normalization between caller inputs and the wire.
//!
//! The node speaks one dialect: unsigned quantities are `0x`-prefixed,
//! lower-case hex with no leading zeros (`0x0` for zero), and block
//! references are either such a quantity or one of the block tags.
//! Callers may hand us any of
//!
//! - a native integer (`123`, `-1` is rejected),
//! - an arbitrary-precision integer (`U256`),
//! - a decimal numeral (`"123"`),
//! - a hexadecimal numeral (`"0x7B"`),
//! - a block tag (`BlockTag::Latest` or `"latest"`).
//!
//! [`to_wire`] maps all of them onto the canonical string, and [`from_wire`]
//! projects a wire quantity back into the caller's preferred [`OutputFormat`].

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::QuantityError;

// ─── BlockTag ────────────────────────────────────────────────────────────────

/// Symbolic block reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockTag {
    Earliest,
    Latest,
    Pending,
    Safe,
    Finalized,
}

impl BlockTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
            Self::Pending => "pending",
            Self::Safe => "safe",
            Self::Finalized => "finalized",
        }
    }

    /// Tags that always point at the head of the chain.
    pub fn is_head(&self) -> bool {
        matches!(self, Self::Latest | Self::Pending)
    }
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockTag {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earliest" => Ok(Self::Earliest),
            "latest" => Ok(Self::Latest),
            "pending" => Ok(Self::Pending),
            "safe" => Ok(Self::Safe),
            "finalized" => Ok(Self::Finalized),
            other => Err(QuantityError::invalid(other, "unknown block tag")),
        }
    }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// A numeric value in any of the accepted caller forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumberInput {
    /// Native integer. Signed so that negative inputs can be rejected.
    Native(i128),
    /// Arbitrary-precision integer covering the full protocol range.
    Big(U256),
    /// Decimal or `0x` hexadecimal numeral, or a block tag spelled out.
    Text(String),
    /// Symbolic block reference.
    Tag(BlockTag),
}

macro_rules! native_input {
    ($($t:ty),*) => {
        $(impl From<$t> for NumberInput {
            fn from(v: $t) -> Self {
                Self::Native(v as i128)
            }
        })*
    };
}

native_input!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, i128);

impl From<u128> for NumberInput {
    fn from(v: u128) -> Self {
        Self::Big(U256::from(v))
    }
}

impl From<U256> for NumberInput {
    fn from(v: U256) -> Self {
        Self::Big(v)
    }
}

impl From<&str> for NumberInput {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for NumberInput {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<BlockTag> for NumberInput {
    fn from(v: BlockTag) -> Self {
        Self::Tag(v)
    }
}

impl NumberInput {
    /// Returns the block tag this input names, if any.
    pub fn as_tag(&self) -> Option<BlockTag> {
        match self {
            Self::Tag(tag) => Some(*tag),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Canonical wire string for this input. See [`to_wire`].
    pub fn to_wire(&self, kind: WireKind) -> Result<String, QuantityError> {
        to_wire(self, kind)
    }

    /// The numeric value of this input, rejecting tags and negatives.
    pub fn to_u256(&self) -> Result<U256, QuantityError> {
        match self {
            Self::Native(n) if *n < 0 => {
                Err(QuantityError::invalid(n.to_string(), "quantities are unsigned"))
            }
            Self::Native(n) => Ok(U256::from(*n as u128)),
            Self::Big(u) => Ok(*u),
            Self::Text(s) => parse_unsigned(s),
            Self::Tag(tag) => Err(QuantityError::invalid(tag.as_str(), "block tag is not a number")),
        }
    }
}

impl fmt::Display for NumberInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(n) => write!(f, "{n}"),
            Self::Big(u) => write!(f, "{u}"),
            Self::Text(s) => f.write_str(s),
            Self::Tag(tag) => f.write_str(tag.as_str()),
        }
    }
}

/// What the wire value will be used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    /// A plain unsigned quantity: tags are rejected.
    Quantity,
    /// A block reference: tags pass through unchanged.
    Block,
}

// ─── Outputs ─────────────────────────────────────────────────────────────────

/// Caller-selected projection of a wire quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `u64`, only when the value fits.
    Native,
    /// `U256`.
    #[default]
    Big,
    /// Canonical `0x` hex string.
    Hex,
    /// Decimal numeral string.
    Decimal,
}

/// A wire quantity projected into an [`OutputFormat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormattedNumber {
    Native(u64),
    Big(U256),
    Hex(String),
    Decimal(String),
}

impl FormattedNumber {
    pub fn format(&self) -> OutputFormat {
        match self {
            Self::Native(_) => OutputFormat::Native,
            Self::Big(_) => OutputFormat::Big,
            Self::Hex(_) => OutputFormat::Hex,
            Self::Decimal(_) => OutputFormat::Decimal,
        }
    }
}

impl From<FormattedNumber> for NumberInput {
    fn from(v: FormattedNumber) -> Self {
        match v {
            FormattedNumber::Native(n) => Self::Native(n as i128),
            FormattedNumber::Big(u) => Self::Big(u),
            FormattedNumber::Hex(s) | FormattedNumber::Decimal(s) => Self::Text(s),
        }
    }
}

impl fmt::Display for FormattedNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(n) => write!(f, "{n}"),
            Self::Big(u) => write!(f, "{u}"),
            Self::Hex(s) | Self::Decimal(s) => f.write_str(s),
        }
    }
}

// ─── Conversions ─────────────────────────────────────────────────────────────

/// Convert any accepted input form into its canonical wire string.
///
/// Block tags pass through only for [`WireKind::Block`]; numbers are encoded
/// as minimal lower-case hex. Negative, malformed and out-of-range inputs are
/// rejected with [`QuantityError::InvalidNumericInput`].
pub fn to_wire(input: &NumberInput, kind: WireKind) -> Result<String, QuantityError> {
    if let Some(tag) = input.as_tag() {
        return match kind {
            WireKind::Block => Ok(tag.as_str().to_string()),
            WireKind::Quantity => Err(QuantityError::invalid(
                tag.as_str(),
                "block tag is not a quantity",
            )),
        };
    }
    input.to_u256().map(encode_hex)
}

/// Project a wire quantity into the requested output format.
pub fn from_wire(wire: &str, format: OutputFormat) -> Result<FormattedNumber, QuantityError> {
    let digits = hex_digits(wire)
        .ok_or_else(|| QuantityError::invalid(wire, "wire quantities are 0x-prefixed hex"))?;
    let value = parse_radix(wire, digits, 16)?;
    Ok(match format {
        OutputFormat::Native => {
            FormattedNumber::Native(u64::try_from(value).map_err(|_| {
                QuantityError::NumericOverflow {
                    value: wire.to_string(),
                    target: "u64",
                }
            })?)
        }
        OutputFormat::Big => FormattedNumber::Big(value),
        OutputFormat::Hex => FormattedNumber::Hex(encode_hex(value)),
        OutputFormat::Decimal => FormattedNumber::Decimal(value.to_string()),
    })
}

/// Minimal lower-case hex with a `0x` prefix.
pub fn encode_hex(value: U256) -> String {
    if value.is_zero() {
        "0x0".to_string()
    } else {
        format!("0x{value:x}")
    }
}

/// Parse a decimal or `0x` hexadecimal numeral as an unsigned 256-bit value.
pub fn parse_unsigned(s: &str) -> Result<U256, QuantityError> {
    if s.starts_with('-') {
        return Err(QuantityError::invalid(s, "quantities are unsigned"));
    }
    if let Some(digits) = hex_digits(s) {
        return parse_radix(s, digits, 16);
    }
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(QuantityError::invalid(s, "not a decimal or hexadecimal numeral"));
    }
    parse_radix(s, s, 10)
}

fn hex_digits(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}

fn parse_radix(original: &str, digits: &str, radix: u64) -> Result<U256, QuantityError> {
    if digits.is_empty() {
        return Err(QuantityError::invalid(original, "missing digits"));
    }
    let valid = match radix {
        16 => digits.bytes().all(|b| b.is_ascii_hexdigit()),
        _ => digits.bytes().all(|b| b.is_ascii_digit()),
    };
    if !valid {
        return Err(QuantityError::invalid(original, "invalid digit"));
    }
    U256::from_str_radix(digits, radix)
        .map_err(|_| QuantityError::invalid(original, "exceeds 256 bits"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_input_forms_agree() {
        let forms: Vec<NumberInput> = vec![
            123u64.into(),
            U256::from(123u64).into(),
            "123".into(),
            "0x7b".into(),
            "0x7B".into(),
            "0x007b".into(),
        ];
        for form in forms {
            assert_eq!(to_wire(&form, WireKind::Block).unwrap(), "0x7b", "{form}");
        }
    }

    #[test]
    fn zero_is_single_digit() {
        assert_eq!(to_wire(&0u64.into(), WireKind::Quantity).unwrap(), "0x0");
        assert_eq!(to_wire(&"0x000".into(), WireKind::Quantity).unwrap(), "0x0");
        assert_eq!(to_wire(&"0".into(), WireKind::Quantity).unwrap(), "0x0");
    }

    #[test]
    fn tags_pass_through_for_blocks_only() {
        assert_eq!(to_wire(&BlockTag::Latest.into(), WireKind::Block).unwrap(), "latest");
        assert_eq!(to_wire(&"finalized".into(), WireKind::Block).unwrap(), "finalized");
        assert!(matches!(
            to_wire(&"pending".into(), WireKind::Quantity),
            Err(QuantityError::InvalidNumericInput { .. })
        ));
    }

    #[test]
    fn negatives_are_rejected() {
        for input in [NumberInput::from(-1i64), "-5".into(), "-0x5".into()] {
            assert!(matches!(
                to_wire(&input, WireKind::Block),
                Err(QuantityError::InvalidNumericInput { .. })
            ));
        }
    }

    #[test]
    fn garbage_is_rejected() {
        for input in ["", "0x", "0xzz", "12a", " 12", "+1", "latests"] {
            assert!(
                to_wire(&input.into(), WireKind::Block).is_err(),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn above_256_bits_is_rejected() {
        let too_big = format!("0x1{}", "0".repeat(64));
        assert!(to_wire(&too_big.as_str().into(), WireKind::Quantity).is_err());
        let max = format!("0x{}", "f".repeat(64));
        assert_eq!(to_wire(&max.as_str().into(), WireKind::Quantity).unwrap(), max);
    }

    #[test]
    fn from_wire_projects_every_format() {
        assert_eq!(from_wire("0x1c8", OutputFormat::Native).unwrap(), FormattedNumber::Native(456));
        assert_eq!(
            from_wire("0x1c8", OutputFormat::Big).unwrap(),
            FormattedNumber::Big(U256::from(456u64))
        );
        assert_eq!(
            from_wire("0x1C8", OutputFormat::Hex).unwrap(),
            FormattedNumber::Hex("0x1c8".into())
        );
        assert_eq!(
            from_wire("0x1c8", OutputFormat::Decimal).unwrap(),
            FormattedNumber::Decimal("456".into())
        );
    }

    #[test]
    fn native_overflow_is_surfaced() {
        let wire = "0x10000000000000000"; // u64::MAX + 1
        assert!(matches!(
            from_wire(wire, OutputFormat::Native),
            Err(QuantityError::NumericOverflow { target: "u64", .. })
        ));
        assert_eq!(
            from_wire("0xffffffffffffffff", OutputFormat::Native).unwrap(),
            FormattedNumber::Native(u64::MAX)
        );
    }

    #[test]
    fn from_wire_rejects_tags_and_decimals() {
        assert!(from_wire("latest", OutputFormat::Big).is_err());
        assert!(from_wire("123", OutputFormat::Big).is_err());
    }

    #[test]
    fn block_tag_serde() {
        let json = serde_json::to_string(&BlockTag::Finalized).unwrap();
        assert_eq!(json, "\"finalized\"");
        let back: BlockTag = serde_json::from_str("\"safe\"").unwrap();
        assert_eq!(back, BlockTag::Safe);
    }
}
