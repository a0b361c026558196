//! The request manager traits consumed by the filter and subscription layers.
//!
//! Every transport implements [`RpcTransport`]. Persistent transports
//! (WebSocket, IPC) additionally implement [`PubSubTransport`] and expose it
//! through [`RpcTransport::as_pubsub`], which returns `None` for
//! request/response transports.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::request::{next_request_id, JsonRpcRequest, JsonRpcResponse};

/// The central async trait every RPC transport must implement.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the response.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Return the transport's identifier (URL or name).
    fn url(&self) -> &str;

    /// The push capability of this transport, if it has one.
    fn as_pubsub(&self) -> Option<&dyn PubSubTransport> {
        None
    }

    /// Convenience: call a method and return the raw `result` value.
    ///
    /// Node-side rejections surface as [`TransportError::Rpc`] with the
    /// node's code and message intact.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError> {
        let req = JsonRpcRequest::new(next_request_id(), method, params);
        let resp = self.send(req).await?;
        resp.into_result().map_err(TransportError::Rpc)
    }
}

/// A subscription id returned by `eth_subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An established push subscription.
///
/// `notifications` yields the `result` payload of every `eth_subscription`
/// message in node emission order. A connection-level failure is delivered
/// as a single `Err` after which the transport drops the sender.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub notifications: mpsc::UnboundedReceiver<Result<Value, TransportError>>,
}

/// Push capability of a persistent transport.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    /// Issue `eth_subscribe(kind, ...params)` and register a notification channel.
    async fn subscribe(
        &self,
        kind: &str,
        params: Vec<Value>,
    ) -> Result<Subscription, TransportError>;

    /// Issue `eth_unsubscribe(id)` and release the notification channel.
    ///
    /// Returns the node's acknowledgement flag.
    async fn unsubscribe(&self, id: &SubscriptionId) -> Result<bool, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::JsonRpcError;
    use std::sync::Arc;

    struct EchoTransport {
        fail: bool,
    }

    #[async_trait]
    impl RpcTransport for EchoTransport {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            if self.fail {
                return Ok(JsonRpcResponse::failure(
                    req.id,
                    JsonRpcError::new(-32601, "method not found"),
                ));
            }
            Ok(JsonRpcResponse::success(req.id, Value::String(req.method)))
        }

        fn url(&self) -> &str {
            "mock://echo"
        }
    }

    #[tokio::test]
    async fn call_returns_result_payload() {
        let transport: Arc<dyn RpcTransport> = Arc::new(EchoTransport { fail: false });
        let value = transport.call("eth_getLogs", vec![]).await.unwrap();
        assert_eq!(value, Value::String("eth_getLogs".into()));
    }

    #[tokio::test]
    async fn call_maps_node_errors_to_rpc() {
        let transport = EchoTransport { fail: true };
        let err = transport.call("eth_foo", vec![]).await.unwrap_err();
        assert!(err.is_execution_error());
        assert_eq!(err.as_rpc().map(|e| e.code), Some(-32601));
    }

    #[test]
    fn request_response_transport_has_no_pubsub() {
        let transport = EchoTransport { fail: false };
        assert!(transport.as_pubsub().is_none());
    }
}
