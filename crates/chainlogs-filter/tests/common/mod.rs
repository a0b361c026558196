//! In-memory node shared by the integration tests.
//!
//! `FakeNode` keeps a log store, installed filters with their cursors and
//! push subscriptions, and answers the filter RPCs the way a real node does.
//! Every request it receives is recorded so tests can assert on what was
//! (or was not) sent.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{address, Address, B256, U256};
use async_trait::async_trait;
use chainlogs_abi::TopicIndex;
use chainlogs_core::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, PubSubTransport, RawLog, RpcTransport,
    Subscription, SubscriptionId, TransportError,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Semaphore};

// ─── Test contract ────────────────────────────────────────────────────────────

pub const BASIC_ABI: &str = r#"[
    {"type":"constructor","inputs":[{"name":"initialValue","type":"uint256"}]},
    {"type":"event","name":"MultiValueEvent","anonymous":false,"inputs":[
        {"name":"str","type":"string","indexed":false},
        {"name":"val","type":"uint256","indexed":false},
        {"name":"flag","type":"bool","indexed":false}
    ]},
    {"type":"event","name":"MultiValueIndexedEvent","anonymous":false,"inputs":[
        {"name":"str","type":"string","indexed":false},
        {"name":"val","type":"uint256","indexed":true},
        {"name":"flag","type":"bool","indexed":true}
    ]},
    {"type":"function","name":"firesMultiValueEvent","inputs":[
        {"name":"str","type":"string"},{"name":"val","type":"uint256"},{"name":"flag","type":"bool"}
    ],"outputs":[],"stateMutability":"nonpayable"}
]"#;

pub const CONTRACT: Address = address!("5fbdb2315678afecb367f032d93f642f64180aa3");
pub const OTHER_CONTRACT: Address = address!("e7f1725e7734ce288f8367e1bb143e90bb3f0512");

pub fn topic_of(event: &str) -> B256 {
    TopicIndex::from_abi_json(BASIC_ABI)
        .unwrap()
        .lookup(event)
        .unwrap()
        .topic
}

fn uint_word(v: u64) -> B256 {
    B256::from(U256::from(v).to_be_bytes::<32>())
}

/// `MultiValueEvent(str, val, flag)` with every parameter in data.
pub fn multi_value_event(s: &str, val: u64, flag: bool) -> RawLog {
    let data = DynSolValue::Tuple(vec![
        DynSolValue::String(s.into()),
        DynSolValue::Uint(U256::from(val), 256),
        DynSolValue::Bool(flag),
    ])
    .abi_encode_params();
    RawLog::new(CONTRACT, vec![topic_of("MultiValueEvent")], data)
}

/// `MultiValueIndexedEvent(str, val, flag)` with `val` and `flag` as topics.
pub fn multi_value_indexed(s: &str, val: u64, flag: bool) -> RawLog {
    let data = DynSolValue::Tuple(vec![DynSolValue::String(s.into())]).abi_encode_params();
    RawLog::new(
        CONTRACT,
        vec![
            topic_of("MultiValueIndexedEvent"),
            uint_word(val),
            B256::with_last_byte(u8::from(flag)),
        ],
        data,
    )
}

/// A log whose signature topic no ABI entry knows.
pub fn foreign_log() -> RawLog {
    RawLog::new(CONTRACT, vec![B256::repeat_byte(0xee)], vec![0u8; 32])
}

// ─── FakeNode ─────────────────────────────────────────────────────────────────

enum Installed {
    Log { criteria: Value, cursor: usize },
    Block { cursor: usize },
    PendingTransaction { cursor: usize },
}

#[derive(Default)]
struct NodeState {
    logs: Vec<RawLog>,
    blocks: Vec<B256>,
    pending: Vec<B256>,
    next_filter: u64,
    filters: HashMap<String, Installed>,
    next_subscription: u64,
    subscriptions: HashMap<String, (Value, mpsc::UnboundedSender<Result<Value, TransportError>>)>,
    requests: Vec<JsonRpcRequest>,
    injected: VecDeque<(String, JsonRpcError)>,
    scheduled: Vec<(String, RawLog)>,
}

pub struct FakeNode {
    push: bool,
    state: Mutex<NodeState>,
    polls_held: AtomicBool,
    poll_gate: Semaphore,
}

impl FakeNode {
    /// A node reached over a persistent transport with push support.
    pub fn persistent() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    /// A node reached over plain request/response.
    pub fn request_response() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    fn build(push: bool) -> Self {
        Self {
            push,
            state: Mutex::new(NodeState::default()),
            polls_held: AtomicBool::new(false),
            poll_gate: Semaphore::new(0),
        }
    }

    /// Every request method received, in order.
    pub fn methods(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.iter().map(|r| r.method.clone()).collect()
    }

    /// Params of every request with `method`, in order.
    pub fn params_of(&self, method: &str) -> Vec<Vec<Value>> {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .map(|r| r.params.clone())
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.params_of(method).len()
    }

    /// Answer the next `method` request with this error.
    pub fn fail_next(&self, method: &str, code: i64, message: &str) {
        self.state
            .lock()
            .unwrap()
            .injected
            .push_back((method.to_string(), JsonRpcError::new(code, message)));
    }

    /// Mine `log` right after the next `method` request has been answered.
    pub fn mine_after(&self, method: &str, log: RawLog) {
        self.state.lock().unwrap().scheduled.push((method.to_string(), log));
    }

    fn run_scheduled(&self, method: &str) {
        let due: Vec<RawLog> = {
            let mut state = self.state.lock().unwrap();
            let (due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut state.scheduled)
                .into_iter()
                .partition(|(m, _)| m == method);
            state.scheduled = rest;
            due.into_iter().map(|(_, log)| log).collect()
        };
        for log in due {
            self.mine(log);
        }
    }

    /// Hold `eth_getFilterChanges` answers until [`FakeNode::release_polls`].
    pub fn hold_polls(&self) {
        self.polls_held.store(true, Ordering::SeqCst);
    }

    pub fn release_polls(&self) {
        self.polls_held.store(false, Ordering::SeqCst);
        self.poll_gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    /// Yield until `method` has been received at least once.
    pub async fn wait_for(&self, method: &str) {
        while self.count(method) == 0 {
            tokio::task::yield_now().await;
        }
    }

    /// Mine `log` into a new block and notify matching subscriptions.
    pub fn mine(&self, mut log: RawLog) -> RawLog {
        let mut state = self.state.lock().unwrap();
        let number = state.blocks.len() as u64 + 1;
        let block_hash = uint_word(number);
        state.blocks.push(block_hash);

        log.block_number = Some(format!("{number:#x}"));
        log.block_hash = Some(block_hash);
        log.transaction_hash = Some(uint_word(0x1000 + number));
        log.transaction_index = Some("0x0".into());
        log.log_index = Some("0x0".into());
        state.logs.push(log.clone());

        let payload = serde_json::to_value(&log).unwrap();
        for (criteria, sink) in state.subscriptions.values() {
            if matches(criteria, &log, None) {
                let _ = sink.send(Ok(payload.clone()));
            }
        }
        log
    }

    /// Deliver `log` to every subscription, bypassing node-side filtering.
    pub fn push_raw(&self, log: &RawLog) {
        let payload = serde_json::to_value(log).unwrap();
        for (_, sink) in self.state.lock().unwrap().subscriptions.values() {
            let _ = sink.send(Ok(payload.clone()));
        }
    }

    /// Deliver a payload that is not a log to every subscription.
    pub fn push_garbage(&self) {
        for (_, sink) in self.state.lock().unwrap().subscriptions.values() {
            let _ = sink.send(Ok(json!({"unexpected": true})));
        }
    }

    /// Drop the connection: every subscription sees one error, then closes.
    pub fn disconnect(&self) {
        let mut state = self.state.lock().unwrap();
        for (_, (_, sink)) in state.subscriptions.drain() {
            let _ = sink.send(Err(TransportError::WebSocket("connection reset".into())));
        }
    }

    pub fn add_pending_transaction(&self, hash: B256) {
        self.state.lock().unwrap().pending.push(hash);
    }

    pub fn subscription_count(&self) -> usize {
        self.state.lock().unwrap().subscriptions.len()
    }

    fn answer(&self, method: &str, params: &[Value]) -> Result<Value, JsonRpcError> {
        let mut state = self.state.lock().unwrap();
        if let Some(pos) = state.injected.iter().position(|(m, _)| m == method) {
            if let Some((_, err)) = state.injected.remove(pos) {
                return Err(err);
            }
        }

        let head = state.blocks.len() as u64;
        match method {
            "eth_newFilter" => {
                let criteria = params.first().cloned().unwrap_or(Value::Null);
                let cursor = state.logs.len();
                Ok(state.install(Installed::Log { criteria, cursor }))
            }
            "eth_newBlockFilter" => {
                let cursor = state.blocks.len();
                Ok(state.install(Installed::Block { cursor }))
            }
            "eth_newPendingTransactionFilter" => {
                let cursor = state.pending.len();
                Ok(state.install(Installed::PendingTransaction { cursor }))
            }
            "eth_getFilterChanges" => {
                let id = filter_id(params);
                let NodeState { logs, blocks, pending, filters, .. } = &mut *state;
                match filters.get_mut(&id) {
                    Some(Installed::Log { criteria, cursor }) => {
                        let fresh: Vec<&RawLog> =
                            logs[*cursor..].iter().filter(|l| matches(criteria, l, None)).collect();
                        *cursor = logs.len();
                        Ok(serde_json::to_value(fresh).unwrap())
                    }
                    Some(Installed::Block { cursor }) => {
                        let fresh = hashes(&blocks[*cursor..]);
                        *cursor = blocks.len();
                        Ok(fresh)
                    }
                    Some(Installed::PendingTransaction { cursor }) => {
                        let fresh = hashes(&pending[*cursor..]);
                        *cursor = pending.len();
                        Ok(fresh)
                    }
                    None => Err(not_found()),
                }
            }
            "eth_getFilterLogs" => match state.filters.get(&filter_id(params)) {
                Some(Installed::Log { criteria, .. }) => Ok(select(&state.logs, criteria, head)),
                Some(_) => Err(JsonRpcError::new(-32000, "filter is not a log filter")),
                None => Err(not_found()),
            },
            "eth_getLogs" => {
                let criteria = params.first().cloned().unwrap_or(Value::Null);
                Ok(select(&state.logs, &criteria, head))
            }
            "eth_uninstallFilter" => Ok(Value::Bool(state.filters.remove(&filter_id(params)).is_some())),
            other => Err(JsonRpcError::new(-32601, format!("the method {other} does not exist"))),
        }
    }
}

impl NodeState {
    fn install(&mut self, filter: Installed) -> Value {
        self.next_filter += 1;
        let id = format!("{:#x}", self.next_filter);
        self.filters.insert(id.clone(), filter);
        Value::String(id)
    }
}

#[async_trait]
impl RpcTransport for FakeNode {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        self.state.lock().unwrap().requests.push(req.clone());
        if req.method == "eth_getFilterChanges" && self.polls_held.load(Ordering::SeqCst) {
            let _permit = self.poll_gate.acquire().await.unwrap();
        }
        let response = match self.answer(&req.method, &req.params) {
            Ok(result) => JsonRpcResponse::success(req.id, result),
            Err(err) => JsonRpcResponse::failure(req.id, err),
        };
        self.run_scheduled(&req.method);
        Ok(response)
    }

    fn url(&self) -> &str {
        if self.push {
            "ws://fake-node"
        } else {
            "http://fake-node"
        }
    }

    fn as_pubsub(&self) -> Option<&dyn PubSubTransport> {
        if self.push {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl PubSubTransport for FakeNode {
    async fn subscribe(&self, kind: &str, params: Vec<Value>) -> Result<Subscription, TransportError> {
        let subscription = self.open_subscription(kind, params);
        self.run_scheduled("eth_subscribe");
        Ok(subscription)
    }

    async fn unsubscribe(&self, id: &SubscriptionId) -> Result<bool, TransportError> {
        let mut state = self.state.lock().unwrap();
        state
            .requests
            .push(JsonRpcRequest::new(0, "eth_unsubscribe", vec![Value::String(id.0.clone())]));
        Ok(state.subscriptions.remove(&id.0).is_some())
    }
}

impl FakeNode {
    fn open_subscription(&self, kind: &str, params: Vec<Value>) -> Subscription {
        let mut state = self.state.lock().unwrap();
        let mut all = vec![Value::String(kind.to_string())];
        all.extend(params.iter().cloned());
        state.requests.push(JsonRpcRequest::new(0, "eth_subscribe", all));

        state.next_subscription += 1;
        let id = format!("{:#x}", 0x1000 + state.next_subscription);
        let (tx, rx) = mpsc::unbounded_channel();
        let criteria = params.into_iter().next().unwrap_or(Value::Null);
        state.subscriptions.insert(id.clone(), (criteria, tx));
        Subscription {
            id: SubscriptionId(id),
            notifications: rx,
        }
    }
}

// ─── Matching ─────────────────────────────────────────────────────────────────

fn not_found() -> JsonRpcError {
    JsonRpcError::new(-32000, "filter not found")
}

fn filter_id(params: &[Value]) -> String {
    params.first().and_then(Value::as_str).unwrap_or_default().to_string()
}

fn hashes(list: &[B256]) -> Value {
    Value::Array(list.iter().map(|h| Value::String(format!("{h:#x}"))).collect())
}

fn select(logs: &[RawLog], criteria: &Value, head: u64) -> Value {
    let hits: Vec<&RawLog> = logs.iter().filter(|l| matches(criteria, l, Some(head))).collect();
    serde_json::to_value(hits).unwrap()
}

fn block_ref(value: &Value, head: u64) -> Option<u64> {
    match value.as_str()? {
        "earliest" => Some(0),
        "latest" | "pending" | "safe" | "finalized" => Some(head),
        hex => u64::from_str_radix(hex.trim_start_matches("0x"), 16).ok(),
    }
}

/// Node-side filter semantics. Block bounds apply only when `head` is given.
fn matches(criteria: &Value, log: &RawLog, head: Option<u64>) -> bool {
    if let Some(head) = head {
        let number = log
            .block_number
            .as_deref()
            .and_then(|n| u64::from_str_radix(n.trim_start_matches("0x"), 16).ok())
            .unwrap_or(0);
        if let Some(from) = criteria.get("fromBlock").and_then(|v| block_ref(v, head)) {
            if number < from {
                return false;
            }
        }
        if let Some(to) = criteria.get("toBlock").and_then(|v| block_ref(v, head)) {
            if number > to {
                return false;
            }
        }
    }

    let address = format!("{:#x}", log.address);
    match criteria.get("address") {
        Some(Value::String(a)) if !a.eq_ignore_ascii_case(&address) => return false,
        Some(Value::Array(set)) if !set.iter().any(|a| a.as_str() == Some(address.as_str())) => {
            return false
        }
        _ => {}
    }

    let Some(topics) = criteria.get("topics").and_then(Value::as_array) else {
        return true;
    };
    topics.iter().enumerate().all(|(i, want)| {
        let got = log.topics.get(i).map(|t| format!("{t:#x}"));
        match want {
            Value::Null => true,
            Value::String(t) => got.as_deref() == Some(t.as_str()),
            Value::Array(set) => got.is_some_and(|g| set.iter().any(|t| t.as_str() == Some(g.as_str()))),
            _ => false,
        }
    })
}
