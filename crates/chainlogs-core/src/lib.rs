//! chainlogs-core: wire types and collaborator traits for ChainLogs.
//!
//! # Overview
//!
//! ChainLogs is the event and filter layer of an Ethereum-style JSON-RPC
//! client. The core crate defines:
//!
//! - [`RpcTransport`]: the request manager every transport implements
//! - [`PubSubTransport`]: the optional push capability of persistent transports
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`]: wire types
//! - [`quantity`]: lossless conversion between numeric inputs and canonical hex
//! - [`FilterParams`] / [`RawLog`]: the filter and log data model

pub mod error;
pub mod filter;
pub mod log;
pub mod quantity;
pub mod request;
pub mod transport;

pub use error::{QuantityError, TransportError};
pub use filter::{AddressFilter, FilterId, FilterKind, FilterParams, TopicFilter};
pub use log::RawLog;
pub use quantity::{BlockTag, FormattedNumber, NumberInput, OutputFormat, WireKind};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId, RpcParam};
pub use transport::{PubSubTransport, RpcTransport, Subscription, SubscriptionId};
