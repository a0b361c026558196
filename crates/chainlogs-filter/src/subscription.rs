//! Push-based log subscriptions over persistent transports.
//!
//! The push capability is checked once, when the engine is built. Over a
//! request/response transport construction fails with
//! [`FilterError::UnsupportedTransport`] and nothing is sent.
//!
//! An [`EventStream`] yields items in node emission order. Logs retracted by
//! a reorganization arrive in-band with `removed = true`. A connection-level
//! error is yielded once and ends the stream; there is no resubscription.

use std::collections::{HashSet, VecDeque};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use alloy_primitives::B256;
use chainlogs_core::{
    BlockTag, FilterParams, RawLog, RpcTransport, SubscriptionId, TransportError,
};
use futures::Stream;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::EventsConfig;
use crate::error::FilterError;
use crate::manager::FilterManager;

/// Per-log transformation applied to every delivered log, historical or live.
/// `None` drops the log.
pub type LogMapper<T> = Box<dyn FnMut(RawLog) -> Option<Result<T, FilterError>> + Send>;

/// Opens `eth_subscribe("logs")` streams.
#[derive(Clone)]
pub struct SubscriptionEngine {
    transport: Arc<dyn RpcTransport>,
    config: EventsConfig,
}

impl std::fmt::Debug for SubscriptionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionEngine")
            .field("transport", &self.transport.url())
            .field("config", &self.config)
            .finish()
    }
}

impl SubscriptionEngine {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Result<Self, FilterError> {
        Self::with_config(transport, EventsConfig::default())
    }

    pub fn with_config(transport: Arc<dyn RpcTransport>, config: EventsConfig) -> Result<Self, FilterError> {
        if transport.as_pubsub().is_none() {
            return Err(FilterError::UnsupportedTransport {
                transport: transport.url().to_string(),
            });
        }
        Ok(Self { transport, config })
    }

    /// Stream raw logs matching `params`.
    pub async fn subscribe(&self, params: &FilterParams) -> Result<EventStream<RawLog>, FilterError> {
        self.subscribe_mapped(params, |log| Some(Ok(log))).await
    }

    /// Stream logs matching `params`, transformed by `map`.
    ///
    /// When catch-up is enabled and `params` names a historical `fromBlock`,
    /// matching logs from that block up to `latest` are delivered ahead of any
    /// live log. The subscription is opened before the history is fetched, so
    /// nothing emitted in between is lost; live entries already covered by the
    /// history are skipped.
    pub async fn subscribe_mapped<T, F>(
        &self,
        params: &FilterParams,
        mut map: F,
    ) -> Result<EventStream<T>, FilterError>
    where
        F: FnMut(RawLog) -> Option<Result<T, FilterError>> + Send + 'static,
    {
        let catch_up = self.catch_up_start(params)?;
        let pubsub = self
            .transport
            .as_pubsub()
            .ok_or_else(|| FilterError::UnsupportedTransport {
                transport: self.transport.url().to_string(),
            })?;
        let subscription = pubsub
            .subscribe("logs", vec![params.to_subscription_wire()])
            .await?;
        info!(subscription_id = %subscription.id, "log subscription established");

        let mut backlog = VecDeque::new();
        let mut replayed = HashSet::new();
        if let Some(from) = catch_up {
            let mut history = params.clone();
            history.from_block = Some(from.into());
            history.to_block = Some(BlockTag::Latest.into());
            let logs = match FilterManager::with_config(self.transport.clone(), self.config.clone())
                .logs(&history)
                .await
            {
                Ok(logs) => logs,
                Err(e) => {
                    if let Err(cleanup) = pubsub.unsubscribe(&subscription.id).await {
                        debug!(subscription_id = %subscription.id, error = %cleanup, "unsubscribe after failed catch-up");
                    }
                    return Err(e);
                }
            };
            info!(subscription_id = %subscription.id, historical_count = logs.len(), "fetched past logs");
            replayed.extend(logs.iter().filter_map(replay_key));
            backlog.extend(logs.into_iter().filter_map(&mut map));
        }

        Ok(EventStream {
            id: subscription.id,
            transport: self.transport.clone(),
            backlog,
            replayed,
            notifications: subscription.notifications,
            map: Box::new(map),
            state: StreamState::Open,
            unsubscribe_on_drop: self.config.unsubscribe_on_drop,
        })
    }

    /// The normalized historical start block, if a catch-up is due.
    fn catch_up_start(&self, params: &FilterParams) -> Result<Option<String>, FilterError> {
        let from = match &params.from_block {
            Some(from) if self.config.catch_up_past_logs => from,
            _ => return Ok(None),
        };
        if from.as_tag().is_some_and(|tag| tag.is_head()) {
            return Ok(None);
        }
        Ok(Some(from.to_wire(chainlogs_core::WireKind::Block)?))
    }
}

/// Identity of a mined log. Retractions and pending logs have none.
fn replay_key(log: &RawLog) -> Option<(B256, String)> {
    if log.removed {
        return None;
    }
    Some((log.block_hash?, log.log_index.clone()?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Open,
    /// Ended by the transport.
    Terminated,
    /// Ended by the caller.
    Unsubscribed,
}

/// A live, cancellable sequence of subscription items.
pub struct EventStream<T> {
    id: SubscriptionId,
    transport: Arc<dyn RpcTransport>,
    backlog: VecDeque<Result<T, FilterError>>,
    /// Replayed logs that may still arrive live.
    replayed: HashSet<(B256, String)>,
    notifications: mpsc::UnboundedReceiver<Result<Value, TransportError>>,
    map: LogMapper<T>,
    state: StreamState,
    unsubscribe_on_drop: bool,
}

impl<T> EventStream<T> {
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Still delivering: neither unsubscribed nor ended by the transport.
    pub fn is_open(&self) -> bool {
        self.state == StreamState::Open
    }

    /// Stop delivery and send `eth_unsubscribe`.
    ///
    /// Delivery stops immediately: anything already queued or arriving before
    /// the node acknowledges is discarded. Returns the node's acknowledgement,
    /// or `false` without any RPC if the stream had already ended.
    pub async fn unsubscribe(&mut self) -> Result<bool, FilterError> {
        if self.state != StreamState::Open {
            return Ok(false);
        }
        self.state = StreamState::Unsubscribed;
        self.backlog.clear();
        self.replayed.clear();
        self.notifications.close();

        let pubsub = self
            .transport
            .as_pubsub()
            .ok_or_else(|| FilterError::UnsupportedTransport {
                transport: self.transport.url().to_string(),
            })?;
        let ack = pubsub.unsubscribe(&self.id).await?;
        info!(subscription_id = %self.id, ack, "log subscription cancelled");
        Ok(ack)
    }
}

impl<T> Unpin for EventStream<T> {}

impl<T> Stream for EventStream<T> {
    type Item = Result<T, FilterError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.state != StreamState::Open {
            return Poll::Ready(None);
        }
        if let Some(item) = this.backlog.pop_front() {
            return Poll::Ready(Some(item));
        }

        loop {
            let value = match this.notifications.poll_recv(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => {
                    debug!(subscription_id = %this.id, "notification channel closed");
                    this.state = StreamState::Terminated;
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(Err(e))) => {
                    warn!(subscription_id = %this.id, error = %e, "subscription terminated by transport");
                    this.state = StreamState::Terminated;
                    return Poll::Ready(Some(Err(FilterError::Transport(e))));
                }
                Poll::Ready(Some(Ok(value))) => value,
            };

            let log: RawLog = match serde_json::from_value(value) {
                Ok(log) => log,
                Err(e) => {
                    return Poll::Ready(Some(Err(FilterError::invalid_response("eth_subscription", e))))
                }
            };
            if !this.replayed.is_empty() {
                if let Some(key) = replay_key(&log) {
                    if this.replayed.remove(&key) {
                        continue;
                    }
                }
            }
            if let Some(item) = (this.map)(log) {
                return Poll::Ready(Some(item));
            }
        }
    }
}

impl<T> Drop for EventStream<T> {
    fn drop(&mut self) {
        if self.state != StreamState::Open || !self.unsubscribe_on_drop {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(subscription_id = %self.id, "no runtime, skipping unsubscribe on drop");
            return;
        };
        let transport = self.transport.clone();
        let id = self.id.clone();
        runtime.spawn(async move {
            if let Some(pubsub) = transport.as_pubsub() {
                if let Err(e) = pubsub.unsubscribe(&id).await {
                    debug!(subscription_id = %id, error = %e, "unsubscribe on drop failed");
                }
            }
        });
    }
}

impl<T> std::fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("backlog", &self.backlog.len())
            .finish()
    }
}
