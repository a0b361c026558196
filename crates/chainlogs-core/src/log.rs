//! The raw log entry as returned by `eth_getLogs`, `eth_getFilterChanges`
//! and `eth_subscription` notifications.

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::error::QuantityError;
use crate::quantity::{self, FormattedNumber, OutputFormat};

/// A raw EVM log.
///
/// Numeric position fields are kept as wire hex so that callers choose the
/// projection they need through the `*_as` accessors. Pending logs carry no
/// position at all, hence the `Option`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<String>,
    /// `true` when a reorganization retracted this log.
    #[serde(default)]
    pub removed: bool,
}

impl RawLog {
    /// A log with only address, topics and data set.
    pub fn new(address: Address, topics: Vec<B256>, data: impl Into<Bytes>) -> Self {
        Self {
            address,
            topics,
            data: data.into(),
            block_number: None,
            block_hash: None,
            transaction_hash: None,
            transaction_index: None,
            log_index: None,
            removed: false,
        }
    }

    /// The event signature topic, if the log has one.
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn block_number_as(&self, format: OutputFormat) -> Result<Option<FormattedNumber>, QuantityError> {
        project(self.block_number.as_deref(), format)
    }

    pub fn log_index_as(&self, format: OutputFormat) -> Result<Option<FormattedNumber>, QuantityError> {
        project(self.log_index.as_deref(), format)
    }

    pub fn transaction_index_as(
        &self,
        format: OutputFormat,
    ) -> Result<Option<FormattedNumber>, QuantityError> {
        project(self.transaction_index.as_deref(), format)
    }
}

fn project(wire: Option<&str>, format: OutputFormat) -> Result<Option<FormattedNumber>, QuantityError> {
    wire.map(|w| quantity::from_wire(w, format)).transpose()
}
