//! Event shapes: the resolved, immutable form of an ABI event definition.

use alloy_dyn_abi::{DynSolType, Specifier};
use alloy_json_abi::Event;
use alloy_primitives::B256;
use serde_json::Value;

use crate::error::AbiError;
use crate::fingerprint;

/// One event parameter with its resolved type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventParamShape {
    pub name: String,
    pub ty: DynSolType,
    pub indexed: bool,
}

impl EventParamShape {
    /// Indexed reference types are stored as their keccak256 hash.
    pub fn is_hashed_when_indexed(&self) -> bool {
        is_reference_type(&self.ty)
    }
}

/// An ABI event with its signature topic computed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventShape {
    pub name: String,
    /// Canonical `Name(type1,type2,...)` string.
    pub signature: String,
    /// keccak256 of `signature`. Never appears in logs of anonymous events.
    pub topic: B256,
    pub anonymous: bool,
    pub params: Vec<EventParamShape>,
}

impl EventShape {
    /// Resolve an alloy JSON ABI event.
    pub fn from_event(event: &Event) -> Result<Self, AbiError> {
        let mut params = Vec::with_capacity(event.inputs.len());
        for (i, input) in event.inputs.iter().enumerate() {
            let ty = input.resolve().map_err(|e| AbiError::UnresolvedType {
                event: event.name.clone(),
                param: display_name(&input.name, i),
                reason: e.to_string(),
            })?;
            params.push(EventParamShape {
                name: input.name.clone(),
                ty,
                indexed: input.indexed,
            });
        }

        let signature = event.signature();
        Ok(Self {
            name: event.name.clone(),
            topic: fingerprint::keccak256_signature(&signature),
            signature,
            anonymous: event.anonymous,
            params,
        })
    }

    /// Parse a human-readable declaration such as
    /// `event Transfer(address indexed from, address indexed to, uint256 value)`.
    pub fn parse(declaration: &str) -> Result<Self, AbiError> {
        let event = Event::parse(declaration).map_err(|e| AbiError::InvalidAbi {
            reason: format!("'{declaration}': {e}"),
        })?;
        Self::from_event(&event)
    }

    /// All event shapes of a JSON ABI, in declaration order.
    ///
    /// Accepts either a bare ABI array or an artifact object with an `abi` member.
    pub fn from_abi_json(json: &str) -> Result<Vec<Self>, AbiError> {
        let root: Value = serde_json::from_str(json)?;
        let items = match &root {
            Value::Array(items) => items,
            Value::Object(obj) => match obj.get("abi") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(AbiError::InvalidAbi {
                        reason: "expected an ABI array or an object with an 'abi' array".into(),
                    })
                }
            },
            _ => {
                return Err(AbiError::InvalidAbi {
                    reason: "expected an ABI array".into(),
                })
            }
        };

        items
            .iter()
            .filter(|item| item.get("type").and_then(Value::as_str) == Some("event"))
            .map(|item| {
                let event = event_from_item(item)?;
                Self::from_event(&event)
            })
            .collect()
    }

    pub fn param(&self, name: &str) -> Option<&EventParamShape> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Indexed parameters in declaration order, with their topic positions.
    pub fn indexed_params(&self) -> impl Iterator<Item = (usize, &EventParamShape)> {
        let first = self.first_param_topic();
        self.params
            .iter()
            .filter(|p| p.indexed)
            .enumerate()
            .map(move |(k, p)| (first + k, p))
    }

    /// Topic position carrying the indexed parameter `name`.
    pub fn topic_position(&self, name: &str) -> Option<usize> {
        self.indexed_params()
            .find(|(_, p)| p.name == name)
            .map(|(pos, _)| pos)
    }

    /// Non-indexed parameters in declaration order.
    pub fn data_params(&self) -> impl Iterator<Item = &EventParamShape> {
        self.params.iter().filter(|p| !p.indexed)
    }

    /// Number of topics a log of this event carries.
    pub fn topic_count(&self) -> usize {
        self.first_param_topic() + self.params.iter().filter(|p| p.indexed).count()
    }

    fn first_param_topic(&self) -> usize {
        if self.anonymous {
            0
        } else {
            1
        }
    }
}

/// `string`, `bytes`, arrays and tuples: everything not encoded in place.
pub fn is_reference_type(ty: &DynSolType) -> bool {
    matches!(
        ty,
        DynSolType::String
            | DynSolType::Bytes
            | DynSolType::Array(_)
            | DynSolType::FixedArray(..)
            | DynSolType::Tuple(_)
    )
}

pub(crate) fn display_name(name: &str, position: usize) -> String {
    if name.is_empty() {
        format!("#{position}")
    } else {
        name.to_string()
    }
}

// ABI items carry a `type` discriminator and frequently omit members that
// default to false/empty; normalize before handing the item to alloy.
fn event_from_item(item: &Value) -> Result<Event, AbiError> {
    let mut obj = item.as_object().cloned().ok_or_else(|| AbiError::InvalidAbi {
        reason: "event entry is not an object".into(),
    })?;
    obj.remove("type");
    obj.entry("anonymous").or_insert(Value::Bool(false));
    obj.entry("name").or_insert_with(|| Value::String(String::new()));
    match obj.get_mut("inputs") {
        Some(Value::Array(inputs)) => {
            for input in inputs.iter_mut().filter_map(Value::as_object_mut) {
                input.entry("name").or_insert_with(|| Value::String(String::new()));
                input.entry("indexed").or_insert(Value::Bool(false));
            }
        }
        _ => {
            obj.insert("inputs".into(), Value::Array(Vec::new()));
        }
    }
    serde_json::from_value(Value::Object(obj)).map_err(|e| AbiError::InvalidAbi {
        reason: e.to_string(),
    })
}
