//! Server-side filter lifecycle: install, poll, fetch and uninstall.
//!
//! A filter lives on the node; the client only holds its id. The node keeps
//! the incremental-changes cursor, so a poll is not idempotent and polls of
//! one handle are serialized through a per-handle lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy_primitives::B256;
use chainlogs_core::{
    FilterId, FilterKind, FilterParams, NumberInput, RawLog, RpcTransport, TransportError,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::EventsConfig;
use crate::error::{is_filter_not_found, FilterError};

/// Incremental results of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChanges {
    /// From a log filter.
    Logs(Vec<RawLog>),
    /// Block hashes or pending transaction hashes.
    Hashes(Vec<B256>),
}

impl FilterChanges {
    pub fn len(&self) -> usize {
        match self {
            Self::Logs(l) => l.len(),
            Self::Hashes(h) => h.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct FilterState {
    destroyed: AtomicBool,
    poll_lock: Mutex<()>,
}

/// Client-side reference to a node filter. Clones share lifecycle state.
#[derive(Debug, Clone)]
pub struct FilterHandle {
    id: FilterId,
    kind: FilterKind,
    state: Arc<FilterState>,
}

impl FilterHandle {
    fn new(id: FilterId, kind: FilterKind) -> Self {
        Self {
            id,
            kind,
            state: Arc::default(),
        }
    }

    /// Refer to an existing node filter by a caller-supplied id
    /// (`123`, `U256`, `"0x7b"` all name filter `0x7b`).
    pub fn from_id(id: impl Into<NumberInput>, kind: FilterKind) -> Result<Self, FilterError> {
        Ok(Self::new(FilterId::from_input(id)?, kind))
    }

    /// Refer to an existing node filter by its verbatim id.
    pub fn from_raw(id: FilterId, kind: FilterKind) -> Self {
        Self::new(id, kind)
    }

    pub fn id(&self) -> &FilterId {
        &self.id
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Uninstalled locally, or reported unknown by the node.
    pub fn is_destroyed(&self) -> bool {
        self.state.destroyed.load(Ordering::Acquire)
    }

    fn mark_destroyed(&self) -> bool {
        self.state.destroyed.swap(true, Ordering::AcqRel)
    }

    fn id_param(&self) -> Vec<Value> {
        vec![Value::String(self.id.as_str().to_string())]
    }
}

/// Issues the filter RPCs against one transport.
#[derive(Clone)]
pub struct FilterManager {
    transport: Arc<dyn RpcTransport>,
    config: EventsConfig,
}

impl FilterManager {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self::with_config(transport, EventsConfig::default())
    }

    pub fn with_config(transport: Arc<dyn RpcTransport>, config: EventsConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &EventsConfig {
        &self.config
    }

    // ─── Creation ────────────────────────────────────────────────────────────

    /// `eth_newFilter`. Omitted block references use the configured defaults.
    pub async fn create_log_filter(&self, params: &FilterParams) -> Result<FilterHandle, FilterError> {
        let wire = params.to_wire(self.config.default_from_block, self.config.default_to_block)?;
        self.install(FilterKind::Log, vec![wire]).await
    }

    /// `eth_newBlockFilter`: polling yields new block hashes.
    pub async fn create_block_filter(&self) -> Result<FilterHandle, FilterError> {
        self.install(FilterKind::Block, vec![]).await
    }

    /// `eth_newPendingTransactionFilter`: polling yields pending transaction hashes.
    pub async fn create_pending_transaction_filter(&self) -> Result<FilterHandle, FilterError> {
        self.install(FilterKind::PendingTransaction, vec![]).await
    }

    async fn install(&self, kind: FilterKind, params: Vec<Value>) -> Result<FilterHandle, FilterError> {
        let method = kind.creation_method();
        let result = self
            .transport
            .call(method, params)
            .await
            .map_err(|e| match e {
                TransportError::Rpc(err) => FilterError::CreationRejected {
                    code: err.code,
                    message: err.message,
                },
                other => other.into(),
            })?;
        let id = FilterId::from_value(&result).map_err(|e| FilterError::invalid_response(method, e))?;
        info!(filter_id = %id, kind = %kind, "filter installed");
        Ok(FilterHandle::new(id, kind))
    }

    // ─── Polling ─────────────────────────────────────────────────────────────

    /// `eth_getFilterChanges`: entries new since the previous poll of this filter.
    ///
    /// A second concurrent poll of the same handle fails immediately with
    /// [`FilterError::ConcurrentPollRejected`].
    pub async fn poll(&self, handle: &FilterHandle) -> Result<FilterChanges, FilterError> {
        const METHOD: &str = "eth_getFilterChanges";
        self.ensure_live(handle)?;
        let _guard = handle
            .state
            .poll_lock
            .try_lock()
            .map_err(|_| FilterError::ConcurrentPollRejected {
                id: handle.id.clone(),
            })?;

        let result = self
            .transport
            .call(METHOD, handle.id_param())
            .await
            .map_err(|e| self.filter_error(handle, e))?;

        let changes = match handle.kind {
            FilterKind::Log => FilterChanges::Logs(parse_result(METHOD, result)?),
            FilterKind::Block | FilterKind::PendingTransaction => {
                FilterChanges::Hashes(parse_result(METHOD, result)?)
            }
        };
        debug!(filter_id = %handle.id, count = changes.len(), "filter polled");
        Ok(changes)
    }

    /// Poll a log filter.
    pub async fn poll_logs(&self, handle: &FilterHandle) -> Result<Vec<RawLog>, FilterError> {
        if handle.kind != FilterKind::Log {
            return Err(kind_mismatch(handle, "log"));
        }
        match self.poll(handle).await? {
            FilterChanges::Logs(logs) => Ok(logs),
            FilterChanges::Hashes(_) => Err(kind_mismatch(handle, "log")),
        }
    }

    /// Poll a block or pending-transaction filter.
    pub async fn poll_hashes(&self, handle: &FilterHandle) -> Result<Vec<B256>, FilterError> {
        if handle.kind == FilterKind::Log {
            return Err(kind_mismatch(handle, "block or pending-transaction"));
        }
        match self.poll(handle).await? {
            FilterChanges::Hashes(hashes) => Ok(hashes),
            FilterChanges::Logs(_) => Err(kind_mismatch(handle, "block or pending-transaction")),
        }
    }

    // ─── History ─────────────────────────────────────────────────────────────

    /// `eth_getFilterLogs`: every log matching an installed log filter.
    /// Leaves the incremental-changes cursor untouched.
    pub async fn filter_logs(&self, handle: &FilterHandle) -> Result<Vec<RawLog>, FilterError> {
        const METHOD: &str = "eth_getFilterLogs";
        if handle.kind != FilterKind::Log {
            return Err(kind_mismatch(handle, "log"));
        }
        self.ensure_live(handle)?;
        let result = self
            .transport
            .call(METHOD, handle.id_param())
            .await
            .map_err(|e| self.filter_error(handle, e))?;
        let logs: Vec<RawLog> = parse_result(METHOD, result)?;
        debug!(filter_id = %handle.id, count = logs.len(), "filter logs fetched");
        Ok(logs)
    }

    /// `eth_getLogs`: matching logs for raw parameters, no filter installed.
    pub async fn logs(&self, params: &FilterParams) -> Result<Vec<RawLog>, FilterError> {
        const METHOD: &str = "eth_getLogs";
        let wire = params.to_wire(self.config.default_from_block, self.config.default_to_block)?;
        let result = self.transport.call(METHOD, vec![wire]).await?;
        let logs: Vec<RawLog> = parse_result(METHOD, result)?;
        debug!(count = logs.len(), "logs fetched");
        Ok(logs)
    }

    // ─── Teardown ────────────────────────────────────────────────────────────

    /// `eth_uninstallFilter`. Returns the node's acknowledgement.
    ///
    /// The handle is destroyed whatever the outcome. Destroying an already
    /// destroyed handle sends nothing, and a node that no longer knows the
    /// filter is not an error.
    pub async fn destroy(&self, handle: &FilterHandle) -> Result<bool, FilterError> {
        if handle.mark_destroyed() {
            debug!(filter_id = %handle.id, "filter already destroyed");
            return Ok(false);
        }
        match self.transport.call("eth_uninstallFilter", handle.id_param()).await {
            Ok(ack) => {
                let ack = ack.as_bool().unwrap_or(false);
                info!(filter_id = %handle.id, ack, "filter uninstalled");
                Ok(ack)
            }
            Err(TransportError::Rpc(err)) if is_filter_not_found(&err) => {
                debug!(filter_id = %handle.id, "node did not know filter");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn ensure_live(&self, handle: &FilterHandle) -> Result<(), FilterError> {
        if handle.is_destroyed() {
            return Err(FilterError::FilterNotFound {
                id: handle.id.clone(),
            });
        }
        Ok(())
    }

    fn filter_error(&self, handle: &FilterHandle, err: TransportError) -> FilterError {
        match err {
            TransportError::Rpc(rpc) if is_filter_not_found(&rpc) => {
                handle.mark_destroyed();
                warn!(filter_id = %handle.id, "filter unknown to node, treating as destroyed");
                FilterError::FilterNotFound {
                    id: handle.id.clone(),
                }
            }
            other => other.into(),
        }
    }
}

fn kind_mismatch(handle: &FilterHandle, expected: &'static str) -> FilterError {
    FilterError::KindMismatch {
        id: handle.id.clone(),
        expected,
        actual: handle.kind,
    }
}

/// Deserialize a result array; `null` counts as empty.
fn parse_result<T: serde::de::DeserializeOwned>(method: &str, result: Value) -> Result<Vec<T>, FilterError> {
    if result.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(result).map_err(|e| FilterError::invalid_response(method, e))
}
