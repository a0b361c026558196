//! Per-contract event access.
//!
//! A [`ContractEvents`] binds one contract address to its topic index.
//! Individual events are reached by name through [`ContractEvents::event`],
//! every event of the contract through [`ContractEvents::all_events`].
//! Both offer `live` (push subscription) and `history` (`eth_getLogs`).

use std::sync::Arc;

use alloy_primitives::Address;
use chainlogs_abi::{
    decode_as, decode_ordered, AbiError, Decoded, EventDecoder, EventLog, EventShape,
    IndexedFilter, NormalizedValue, TopicIndex, TopicMatcher,
};
use chainlogs_core::{FilterParams, NumberInput, RawLog, RpcTransport, TopicFilter};
use tracing::debug;

use crate::config::EventsConfig;
use crate::error::FilterError;
use crate::manager::FilterManager;
use crate::subscription::{EventStream, SubscriptionEngine};

/// Keyword accepted by [`ContractEvents::past_events`] for every event.
pub const ALL_EVENTS: &str = "allEvents";

/// Block range and indexed-value filter for an event query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOptions {
    pub from_block: Option<NumberInput>,
    pub to_block: Option<NumberInput>,
    /// Accepted values per indexed parameter name.
    pub filter: IndexedFilter,
    /// Raw topic filter sent verbatim instead of the computed one.
    pub topics: Option<Vec<TopicFilter>>,
}

impl EventOptions {
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

    /// Only events whose indexed parameter `name` equals `value`.
    pub fn filter(mut self, name: impl Into<String>, value: impl Into<NormalizedValue>) -> Self {
        self.filter = self.filter.with(name, value);
        self
    }

    /// Only events whose indexed parameter `name` equals one of `values`.
    pub fn filter_any<V: Into<NormalizedValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filter = self.filter.with_any(name, values);
        self
    }

    pub fn topics(mut self, topics: Vec<TopicFilter>) -> Self {
        self.topics = Some(topics);
        self
    }

    fn params(&self, address: Address, topics: Vec<TopicFilter>) -> FilterParams {
        FilterParams {
            from_block: self.from_block.clone(),
            to_block: self.to_block.clone(),
            address: Some(address.into()),
            topics: self.topics.clone().unwrap_or(topics),
        }
    }
}

/// An item of the all-events mode: decoded when a shape matched, raw otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractLog {
    Decoded(EventLog),
    Unrecognized(RawLog),
}

impl ContractLog {
    pub fn raw(&self) -> &RawLog {
        match self {
            Self::Decoded(e) => &e.raw,
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.raw().removed
    }

    pub fn as_event(&self) -> Option<&EventLog> {
        match self {
            Self::Decoded(e) => Some(e),
            Self::Unrecognized(_) => None,
        }
    }
}

/// Event access for one deployed contract.
#[derive(Clone)]
pub struct ContractEvents {
    address: Address,
    decoder: EventDecoder,
    transport: Arc<dyn RpcTransport>,
    filters: FilterManager,
    config: EventsConfig,
}

impl ContractEvents {
    pub fn new(address: Address, index: TopicIndex, transport: Arc<dyn RpcTransport>) -> Self {
        Self::with_config(address, index, transport, EventsConfig::default())
    }

    pub fn with_config(
        address: Address,
        index: TopicIndex,
        transport: Arc<dyn RpcTransport>,
        config: EventsConfig,
    ) -> Self {
        Self {
            address,
            decoder: EventDecoder::new(Arc::new(index)),
            filters: FilterManager::with_config(transport.clone(), config.clone()),
            transport,
            config,
        }
    }

    /// Bind from a JSON ABI (bare array or artifact with an `abi` member).
    pub fn from_abi_json(
        address: Address,
        abi_json: &str,
        transport: Arc<dyn RpcTransport>,
    ) -> Result<Self, FilterError> {
        Ok(Self::new(address, TopicIndex::from_abi_json(abi_json)?, transport))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn index(&self) -> &TopicIndex {
        self.decoder.index()
    }

    /// The event called `name`, or with the full signature `name`.
    pub fn event(&self, name: &str) -> Result<ContractEvent, FilterError> {
        let shape = self
            .index()
            .lookup(name)
            .cloned()
            .ok_or_else(|| FilterError::UnknownEvent {
                name: name.to_string(),
            })?;
        Ok(ContractEvent {
            shape: Arc::new(shape),
            contract: self.clone(),
        })
    }

    pub fn all_events(&self) -> AllEvents {
        AllEvents {
            contract: self.clone(),
        }
    }

    /// Historical events by name, or every event with [`ALL_EVENTS`].
    pub async fn past_events(
        &self,
        name: &str,
        options: &EventOptions,
    ) -> Result<Vec<ContractLog>, FilterError> {
        if name == ALL_EVENTS {
            return self.all_events().history(options).await;
        }
        let events = self.event(name)?.history(options).await?;
        Ok(events.into_iter().map(ContractLog::Decoded).collect())
    }

    fn engine(&self) -> Result<SubscriptionEngine, FilterError> {
        SubscriptionEngine::with_config(self.transport.clone(), self.config.clone())
    }
}

/// One named event of a contract.
#[derive(Clone)]
pub struct ContractEvent {
    shape: Arc<EventShape>,
    contract: ContractEvents,
}

impl ContractEvent {
    pub fn shape(&self) -> &EventShape {
        &self.shape
    }

    /// Node-side parameters plus the client-side check for the same filter.
    fn plan(&self, options: &EventOptions) -> Result<(FilterParams, TopicMatcher), FilterError> {
        let matcher = TopicMatcher::compile(&self.shape, &options.filter)?;
        let params = options.params(self.contract.address, matcher.topic_filters(&self.shape));
        Ok((params, matcher))
    }

    /// Stream this event as it is emitted.
    ///
    /// Fails with [`FilterError::UnsupportedTransport`] before anything is
    /// sent when the transport cannot push.
    pub async fn live(&self, options: &EventOptions) -> Result<EventStream<EventLog>, FilterError> {
        let engine = self.contract.engine()?;
        let (params, matcher) = self.plan(options)?;
        let shape = self.shape.clone();
        engine
            .subscribe_mapped(&params, move |raw| {
                match decode_as(&shape, &raw, Some(&matcher)) {
                    Ok(Decoded::Event(event)) => Some(Ok(event)),
                    Ok(Decoded::FilterMismatch | Decoded::NotFound) => None,
                    Err(e) => Some(Err(e.into())),
                }
            })
            .await
    }

    /// Past occurrences of this event in the requested block range.
    ///
    /// A log carrying this event's topic that does not decode fails the whole
    /// query with [`FilterError::Abi`]; `live` yields the same failure as a
    /// single `Err` item instead.
    pub async fn history(&self, options: &EventOptions) -> Result<Vec<EventLog>, FilterError> {
        let (params, matcher) = self.plan(options)?;
        let logs = self.contract.filters.logs(&params).await?;
        let decoded = decode_ordered(&logs, self.contract.config.parallel_decode_threshold, |raw| {
            decode_as(&self.shape, raw, Some(&matcher))
        });

        let mut events = Vec::with_capacity(decoded.len());
        for result in decoded {
            if let Decoded::Event(event) = result? {
                events.push(event);
            }
        }
        debug!(event = %self.shape.name, fetched = logs.len(), matched = events.len(), "history decoded");
        Ok(events)
    }
}

/// Every event of a contract, decoded by whichever shape matches.
#[derive(Clone)]
pub struct AllEvents {
    contract: ContractEvents,
}

impl AllEvents {
    fn params(&self, options: &EventOptions) -> Result<FilterParams, FilterError> {
        if let Some((name, _)) = options.filter.iter().next() {
            return Err(AbiError::InvalidFilterValue {
                param: name.to_string(),
                reason: "indexed filters need a named event; use raw topics instead".into(),
            }
            .into());
        }
        Ok(options.params(self.contract.address, Vec::new()))
    }

    pub async fn live(&self, options: &EventOptions) -> Result<EventStream<ContractLog>, FilterError> {
        let engine = self.contract.engine()?;
        let params = self.params(options)?;
        let decoder = self.contract.decoder.clone();
        engine
            .subscribe_mapped(&params, move |raw| Some(Ok(classify(&decoder, raw))))
            .await
    }

    pub async fn history(&self, options: &EventOptions) -> Result<Vec<ContractLog>, FilterError> {
        let params = self.params(options)?;
        let logs = self.contract.filters.logs(&params).await?;
        let decoder = &self.contract.decoder;
        Ok(decode_ordered(&logs, self.contract.config.parallel_decode_threshold, |raw| {
            classify(decoder, raw.clone())
        }))
    }
}

/// A log whose topic matches a known shape but whose layout does not (an
/// ERC-721 `Transfer` against an ERC-20 ABI) is passed through unrecognized.
fn classify(decoder: &EventDecoder, raw: RawLog) -> ContractLog {
    match decoder.decode(&raw, None) {
        Ok(Decoded::Event(event)) => ContractLog::Decoded(event),
        Ok(Decoded::NotFound | Decoded::FilterMismatch) => ContractLog::Unrecognized(raw),
        Err(e) => {
            debug!(error = %e, topic0 = ?raw.topic0(), "log does not fit its event shape");
            ContractLog::Unrecognized(raw)
        }
    }
}
