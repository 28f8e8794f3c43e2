//! Scripted in-memory node shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use chainfeed_core::{
    ConnectionState, FeedConfig, FeedEvent, FeedSocket, JsonRpcRequest, JsonRpcResponse,
    Transport, TransportError,
};
use chainfeed_stream::ChainStreamClient;

pub const CHAIN_ID: u64 = 41454;
pub const HEADS_SUB: &str = "0x9cef478923ff08bf67fde6c64013158d";

/// Upper bound on any single wait; with the paused clock this only trips
/// when the client is stuck.
const WAIT: Duration = Duration::from_secs(600);

pub fn config() -> FeedConfig {
    FeedConfig::new("http://node.test", "ws://node.test", CHAIN_ID)
}

#[derive(Debug, Clone)]
pub enum Reply {
    Result(Value),
    RateLimited,
    Fail,
    Hang,
}

#[derive(Debug, Clone)]
pub struct HttpCall {
    pub at: Instant,
    pub method: String,
    pub params: Vec<Value>,
}

#[derive(Default)]
struct NodeState {
    chain_id: u64,
    sockets: VecDeque<FakeSocket>,
    opens: usize,
    queued: HashMap<String, VecDeque<Reply>>,
    always: HashMap<String, Reply>,
    calls: Vec<HttpCall>,
}

/// Fake node: HTTP replies are scripted per method, sockets are handed out
/// in the order they were added and every open fails once they run out.
pub struct FakeNode {
    state: Mutex<NodeState>,
}

impl FakeNode {
    pub fn new(chain_id: u64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(NodeState {
                chain_id,
                ..NodeState::default()
            }),
        })
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.state.lock().unwrap().chain_id = chain_id;
    }

    /// Script the next socket open to succeed.
    pub fn add_socket(&self) -> ServerEnd {
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        self.state.lock().unwrap().sockets.push_back(FakeSocket {
            inbound,
            outbound,
            closed: Arc::clone(&closed),
        });
        ServerEnd {
            to_client: Some(to_client),
            from_client,
            closed,
        }
    }

    /// One-shot reply for the next call of `method`.
    pub fn reply(&self, method: &str, reply: Reply) {
        self.state
            .lock()
            .unwrap()
            .queued
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Reply used for `method` once its one-shot replies are exhausted.
    pub fn always(&self, method: &str, reply: Reply) {
        self.state
            .lock()
            .unwrap()
            .always
            .insert(method.to_string(), reply);
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn calls(&self, method: &str) -> Vec<HttpCall> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    pub fn methods(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|c| c.method.clone())
            .collect()
    }

    fn next_reply(&self, req: &JsonRpcRequest) -> Reply {
        let mut state = self.state.lock().unwrap();
        state.calls.push(HttpCall {
            at: Instant::now(),
            method: req.method.clone(),
            params: req.params.clone(),
        });
        if let Some(reply) = state.queued.get_mut(&req.method).and_then(VecDeque::pop_front) {
            return reply;
        }
        if let Some(reply) = state.always.get(&req.method) {
            return reply.clone();
        }
        match req.method.as_str() {
            "eth_chainId" => Reply::Result(json!(format!("{:#x}", state.chain_id))),
            "eth_blockNumber" => Reply::Result(json!("0x10")),
            _ => Reply::Result(Value::Null),
        }
    }
}

#[async_trait]
impl Transport for FakeNode {
    async fn open_socket(&self, _url: &str) -> Result<Box<dyn FeedSocket>, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.opens += 1;
        match state.sockets.pop_front() {
            Some(socket) => Ok(Box::new(socket)),
            None => Err(TransportError::WebSocket("connection refused".into())),
        }
    }

    async fn http_post(
        &self,
        url: &str,
        req: JsonRpcRequest,
    ) -> Result<JsonRpcResponse, TransportError> {
        match self.next_reply(&req) {
            Reply::Result(v) => Ok(JsonRpcResponse::success(req.id, v)),
            Reply::RateLimited => Err(TransportError::RateLimited {
                endpoint: url.to_string(),
            }),
            Reply::Fail => Err(TransportError::Http("HTTP 500: internal error".into())),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Client side of a scripted socket.
pub struct FakeSocket {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl FeedSocket for FakeSocket {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.outbound.send(text).map_err(|_| TransportError::Closed)
    }

    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.inbound.close();
    }
}

/// Node side of a scripted socket.
pub struct ServerEnd {
    to_client: Option<mpsc::UnboundedSender<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl ServerEnd {
    pub async fn next_request(&mut self) -> Value {
        let text = tokio::time::timeout(WAIT, self.from_client.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client dropped the socket");
        serde_json::from_str(&text).unwrap()
    }

    /// Read one `eth_subscribe`, acknowledge it and return its kind.
    pub async fn accept_subscription(&mut self, subscription: &str) -> String {
        let req = self.next_request().await;
        assert_eq!(req["method"], "eth_subscribe");
        self.send(json!({"jsonrpc": "2.0", "id": req["id"], "result": subscription}));
        req["params"][0].as_str().unwrap().to_string()
    }

    pub fn send(&self, frame: Value) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(frame.to_string());
        }
    }

    pub fn notify(&self, subscription: &str, result: Value) {
        self.send(json!({
            "jsonrpc": "2.0",
            "method": "eth_subscription",
            "params": {"subscription": subscription, "result": result}
        }));
    }

    /// Drop the node side; the client sees the socket close.
    pub fn hang_up(&mut self) {
        self.to_client = None;
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub async fn next_event(events: &mut broadcast::Receiver<FeedEvent>) -> FeedEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for a feed event")
        .expect("event channel closed")
}

pub async fn wait_for_event(
    events: &mut broadcast::Receiver<FeedEvent>,
    pred: impl Fn(&FeedEvent) -> bool,
) -> FeedEvent {
    loop {
        let event = next_event(events).await;
        if pred(&event) {
            return event;
        }
    }
}

pub async fn wait_for_state(events: &mut broadcast::Receiver<FeedEvent>, state: ConnectionState) {
    wait_for_event(events, |e| matches!(e, FeedEvent::StateChanged { to, .. } if *to == state)).await;
}

/// Spawn a client against `node`, connect it and acknowledge `newHeads`.
pub async fn connected_client(
    node: &Arc<FakeNode>,
    config: FeedConfig,
) -> (ChainStreamClient, broadcast::Receiver<FeedEvent>, ServerEnd) {
    let mut server = node.add_socket();
    let client = ChainStreamClient::spawn(config, node.clone()).unwrap();
    let mut events = client.events();
    client.connect().unwrap();
    assert_eq!(server.accept_subscription(HEADS_SUB).await, "newHeads");
    wait_for_state(&mut events, ConnectionState::Connected).await;
    (client, events, server)
}

/// Let the client task drain everything that is ready.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
