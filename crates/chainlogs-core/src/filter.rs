//! Filter parameters, filter identifiers and their wire encoding.

use std::fmt;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::QuantityError;
use crate::quantity::{self, BlockTag, NumberInput, WireKind};

// ─── Topics and addresses ────────────────────────────────────────────────────

/// One position of a topic filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TopicFilter {
    /// `null` on the wire: any value matches.
    #[default]
    Any,
    /// Exactly this topic.
    Exact(B256),
    /// Any one of these topics.
    OneOf(Vec<B256>),
}

impl TopicFilter {
    /// Build a position from a set of accepted topics, collapsing the trivial cases.
    pub fn from_set(mut topics: Vec<B256>) -> Self {
        match topics.len() {
            0 => Self::Any,
            1 => Self::Exact(topics.remove(0)),
            _ => Self::OneOf(topics),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Whether a log topic at this position satisfies the filter.
    pub fn matches(&self, topic: Option<&B256>) -> bool {
        match (self, topic) {
            (Self::Any, _) => true,
            (Self::Exact(want), Some(got)) => want == got,
            (Self::OneOf(set), Some(got)) => set.contains(got),
            _ => false,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Any => Value::Null,
            Self::Exact(t) => Value::String(format!("{t:#x}")),
            Self::OneOf(set) => Value::Array(
                set.iter().map(|t| Value::String(format!("{t:#x}"))).collect(),
            ),
        }
    }
}

impl From<B256> for TopicFilter {
    fn from(t: B256) -> Self {
        Self::Exact(t)
    }
}

impl From<Option<B256>> for TopicFilter {
    fn from(t: Option<B256>) -> Self {
        t.map_or(Self::Any, Self::Exact)
    }
}

impl From<Vec<B256>> for TopicFilter {
    fn from(set: Vec<B256>) -> Self {
        Self::from_set(set)
    }
}

/// The `address` member of a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressFilter {
    Single(Address),
    Many(Vec<Address>),
}

impl AddressFilter {
    pub fn contains(&self, address: &Address) -> bool {
        match self {
            Self::Single(a) => a == address,
            Self::Many(set) => set.contains(address),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Single(a) => Value::String(format!("{a:#x}")),
            Self::Many(set) => Value::Array(
                set.iter().map(|a| Value::String(format!("{a:#x}"))).collect(),
            ),
        }
    }
}

impl From<Address> for AddressFilter {
    fn from(a: Address) -> Self {
        Self::Single(a)
    }
}

impl From<Vec<Address>> for AddressFilter {
    fn from(set: Vec<Address>) -> Self {
        Self::Many(set)
    }
}

// ─── FilterParams ────────────────────────────────────────────────────────────

/// Log filter criteria as supplied by the caller.
///
/// Block references stay in caller form until [`FilterParams::to_wire`]
/// normalizes them, so a malformed number is reported before any RPC is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterParams {
    pub from_block: Option<NumberInput>,
    pub to_block: Option<NumberInput>,
    pub address: Option<AddressFilter>,
    pub topics: Vec<TopicFilter>,
}

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_block(mut self, block: impl Into<NumberInput>) -> Self {
        self.from_block = Some(block.into());
        self
    }

    pub fn to_block(mut self, block: impl Into<NumberInput>) -> Self {
        self.to_block = Some(block.into());
        self
    }

    pub fn address(mut self, address: impl Into<AddressFilter>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn topics(mut self, topics: Vec<TopicFilter>) -> Self {
        self.topics = topics;
        self
    }

    /// Append one topic position.
    pub fn topic(mut self, topic: impl Into<TopicFilter>) -> Self {
        self.topics.push(topic.into());
        self
    }

    /// Full JSON object for `eth_newFilter` / `eth_getLogs`.
    ///
    /// Omitted block references fall back to the given defaults.
    pub fn to_wire(&self, default_from: BlockTag, default_to: BlockTag) -> Result<Value, QuantityError> {
        let from = match &self.from_block {
            Some(b) => quantity::to_wire(b, WireKind::Block)?,
            None => default_from.as_str().to_string(),
        };
        let to = match &self.to_block {
            Some(b) => quantity::to_wire(b, WireKind::Block)?,
            None => default_to.as_str().to_string(),
        };

        let mut obj = self.criteria();
        obj.insert("fromBlock".into(), Value::String(from));
        obj.insert("toBlock".into(), Value::String(to));
        Ok(Value::Object(obj))
    }

    /// JSON object for `eth_subscribe("logs", ..)`: address and topics only.
    pub fn to_subscription_wire(&self) -> Value {
        Value::Object(self.criteria())
    }

    /// Whether a log passes the address and topic criteria (block range excluded).
    pub fn matches(&self, address: &Address, topics: &[B256]) -> bool {
        if let Some(filter) = &self.address {
            if !filter.contains(address) {
                return false;
            }
        }
        self.topics
            .iter()
            .enumerate()
            .all(|(i, pos)| pos.matches(topics.get(i)))
    }

    fn criteria(&self) -> Map<String, Value> {
        let mut obj = Map::new();
        if let Some(address) = &self.address {
            obj.insert("address".into(), address.to_value());
        }
        // trailing wildcards carry no information
        let used = self
            .topics
            .iter()
            .rposition(|t| !t.is_any())
            .map_or(0, |i| i + 1);
        if used > 0 {
            obj.insert(
                "topics".into(),
                Value::Array(self.topics[..used].iter().map(TopicFilter::to_value).collect()),
            );
        }
        obj
    }
}

// ─── Filter identity ─────────────────────────────────────────────────────────

/// Opaque node-assigned filter identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterId(String);

impl FilterId {
    /// Wrap an id exactly as the node returned it.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Normalize a caller-supplied numeric reference (`123`, `U256`, `"0x7B"`).
    pub fn from_input(input: impl Into<NumberInput>) -> Result<Self, QuantityError> {
        quantity::to_wire(&input.into(), WireKind::Quantity).map(Self)
    }

    /// Interpret the `result` of a filter creation call.
    ///
    /// String ids are kept verbatim; numeric ids are hex-encoded.
    pub fn from_value(value: &Value) -> Result<Self, QuantityError> {
        match value {
            Value::String(s) => Ok(Self(s.clone())),
            Value::Number(n) => match n.as_u64() {
                Some(n) => Self::from_input(n),
                None => Err(QuantityError::invalid(n.to_string(), "filter id is not an unsigned integer")),
            },
            other => Err(QuantityError::invalid(other.to_string(), "filter id must be a string or number")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a server-side filter tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterKind {
    Log,
    Block,
    PendingTransaction,
}

impl FilterKind {
    /// The RPC method that installs this kind of filter.
    pub fn creation_method(&self) -> &'static str {
        match self {
            Self::Log => "eth_newFilter",
            Self::Block => "eth_newBlockFilter",
            Self::PendingTransaction => "eth_newPendingTransactionFilter",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log => write!(f, "log"),
            Self::Block => write!(f, "block"),
            Self::PendingTransaction => write!(f, "pending-transaction"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256, U256};
    use serde_json::json;

    const TRANSFER: B256 =
        b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

    #[test]
    fn omitted_blocks_default_to_latest() {
        let wire = FilterParams::new().to_wire(BlockTag::Latest, BlockTag::Latest).unwrap();
        assert_eq!(wire, json!({ "fromBlock": "latest", "toBlock": "latest" }));
    }

    #[test]
    fn from_block_forms_share_one_wire_shape() {
        let forms: Vec<NumberInput> =
            vec![123u64.into(), U256::from(123u64).into(), "0x7b".into(), "123".into()];
        for form in forms {
            let wire = FilterParams::new()
                .from_block(form)
                .to_wire(BlockTag::Latest, BlockTag::Latest)
                .unwrap();
            assert_eq!(wire["fromBlock"], "0x7b");
        }
    }

    #[test]
    fn negative_block_is_rejected_before_rpc() {
        let err = FilterParams::new()
            .from_block(-1i64)
            .to_wire(BlockTag::Latest, BlockTag::Latest)
            .unwrap_err();
        assert!(matches!(err, QuantityError::InvalidNumericInput { .. }));
    }

    #[test]
    fn address_and_topics_encode_lowercase() {
        let params = FilterParams::new()
            .address(address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"))
            .topic(TRANSFER)
            .topic(TopicFilter::Any)
            .topic(vec![B256::ZERO, B256::with_last_byte(1)])
            .topic(TopicFilter::Any);
        let wire = params.to_subscription_wire();
        assert_eq!(wire["address"], "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        let topics = wire["topics"].as_array().unwrap();
        assert_eq!(topics.len(), 3, "trailing wildcard trimmed");
        assert_eq!(topics[0], format!("{TRANSFER:#x}"));
        assert!(topics[1].is_null());
        assert_eq!(topics[2].as_array().unwrap().len(), 2);
        assert!(wire.get("fromBlock").is_none());
    }

    #[test]
    fn local_matching_follows_positions() {
        let addr = address!("00000000000000000000000000000000000000aa");
        let params = FilterParams::new().address(addr).topic(TRANSFER);
        assert!(params.matches(&addr, &[TRANSFER, B256::ZERO]));
        assert!(!params.matches(&addr, &[B256::ZERO]));
        assert!(!params.matches(&addr, &[]));
        assert!(!params.matches(&Address::ZERO, &[TRANSFER]));
    }

    #[test]
    fn filter_id_from_numeric_forms() {
        let expected = FilterId::new("0x7b");
        assert_eq!(FilterId::from_input(123u64).unwrap(), expected);
        assert_eq!(FilterId::from_input(U256::from(123u64)).unwrap(), expected);
        assert_eq!(FilterId::from_input("0x7B").unwrap(), expected);
        assert_eq!(FilterId::from_value(&json!(123)).unwrap(), expected);
        assert_eq!(FilterId::from_value(&json!("0x7b")).unwrap(), expected);
        assert!(FilterId::from_value(&json!(null)).is_err());
    }

    #[test]
    fn node_ids_are_kept_verbatim() {
        let id = FilterId::from_value(&json!("0xABCDEF0001")).unwrap();
        assert_eq!(id.as_str(), "0xABCDEF0001");
    }
}
