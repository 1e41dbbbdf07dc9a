//! Test doubles and builders
//!
//! [`FakeConnector`] hands every connection the client opens to the test as a
//! [`ServerConn`], which plays the gateway side. [`MockHttp`] answers REST
//! requests from per-path scripts. Both timestamp what they see with the
//! tokio clock, so paused-time tests can assert on spacing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chord_cache::EntityCache;
use chord_client::Client;
use chord_common::{
    CacheConfig, ClientConfig, ClientError, ClientResult, GatewayConfig, ShardCount,
};
use chord_core::GatewayIntents;
use chord_gateway::protocol::{IdentifyPayload, ResumePayload};
use chord_gateway::{
    Connector, Frame, GatewayMessage, OpCode, ShardConfig, ShardCoordinator, ShardEvent,
    Transport,
};
use chord_rest::{HttpClient, HttpRequest, HttpResponse};
use parking_lot::Mutex;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{timeout, Instant};

use crate::fixtures::{self, GATEWAY_URL, HEARTBEAT_INTERVAL_MS};

/// Upper bound on any single wait; with a paused clock this only elapses
/// when the client is stuck
const WAIT: Duration = Duration::from_secs(600);

// ============================================================================
// Gateway double
// ============================================================================

/// Something the client wrote to a connection
#[derive(Debug, Clone)]
pub enum Sent {
    Text { at: Instant, message: GatewayMessage },
    Close { at: Instant, code: u16 },
}

/// Connector whose connections are played by the test
pub struct FakeConnector {
    accepted: mpsc::UnboundedSender<ServerConn>,
    refuse: AtomicBool,
}

impl FakeConnector {
    pub fn new() -> (Arc<Self>, Accepted) {
        let (accepted, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            accepted,
            refuse: AtomicBool::new(false),
        });
        (connector, Accepted(rx))
    }

    /// Fail every connection attempt from now on
    pub fn refuse_connections(&self) {
        self.refuse.store(true, Ordering::Release);
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, url: &str) -> ClientResult<Box<dyn Transport>> {
        if self.refuse.load(Ordering::Acquire) {
            return Err(ClientError::transient("connection refused"));
        }

        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();
        let conn = ServerConn {
            url: url.to_string(),
            to_client,
            from_client,
        };
        self.accepted
            .send(conn)
            .map_err(|_| ClientError::transient("test ended"))?;

        Ok(Box::new(FakeTransport { incoming, outgoing }))
    }
}

/// Client end of a fake connection
struct FakeTransport {
    incoming: mpsc::UnboundedReceiver<Frame>,
    outgoing: mpsc::UnboundedSender<Sent>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&mut self, text: String) -> ClientResult<()> {
        let message = GatewayMessage::from_json(&text)?;
        let _ = self.outgoing.send(Sent::Text {
            at: Instant::now(),
            message,
        });
        Ok(())
    }

    async fn recv(&mut self) -> Option<ClientResult<Frame>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self, code: u16) -> ClientResult<()> {
        let _ = self.outgoing.send(Sent::Close {
            at: Instant::now(),
            code,
        });
        Ok(())
    }
}

/// Connections in the order the client opened them
pub struct Accepted(mpsc::UnboundedReceiver<ServerConn>);

impl Accepted {
    pub async fn next(&mut self) -> ServerConn {
        timeout(WAIT, self.0.recv())
            .await
            .expect("client never connected")
            .expect("connector dropped")
    }

    /// A connection opened since the last call, if any
    pub fn try_next(&mut self) -> Option<ServerConn> {
        self.0.try_recv().ok()
    }

    /// Accept `count` connections, run Hello and Identify on each, and return
    /// them ordered by shard id
    pub async fn identify_all(&mut self, count: usize) -> Vec<(ServerConn, IdentifyPayload)> {
        let mut conns = Vec::with_capacity(count);
        for _ in 0..count {
            let mut conn = self.next().await;
            let identify = conn.handshake().await;
            conns.push((conn, identify));
        }
        conns.sort_by_key(|(_, identify)| identify.shard[0]);
        conns
    }
}

/// Gateway end of a fake connection
pub struct ServerConn {
    url: String,
    to_client: mpsc::UnboundedSender<Frame>,
    from_client: mpsc::UnboundedReceiver<Sent>,
}

impl ServerConn {
    /// URL the client connected to
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn send(&self, message: &GatewayMessage) {
        let json = message.to_json().expect("frame serializes");
        let _ = self.to_client.send(Frame::Text(json));
    }

    pub fn hello(&self) {
        self.send(&GatewayMessage::hello(HEARTBEAT_INTERVAL_MS));
    }

    pub fn dispatch(&self, event: &str, sequence: u64, data: Value) {
        self.send(&GatewayMessage::dispatch(event, sequence, data));
    }

    pub fn ready(&self, shard_id: u32, shard_count: u32, sequence: u64) {
        self.dispatch("READY", sequence, fixtures::ready(shard_id, shard_count));
    }

    pub fn close(&self, code: u16) {
        let _ = self.to_client.send(Frame::Close(Some(code)));
    }

    /// Next thing the client wrote
    pub async fn next(&mut self) -> Sent {
        timeout(WAIT, self.from_client.recv())
            .await
            .expect("client sent nothing")
            .expect("client dropped the connection")
    }

    /// Anything already written and not yet read
    pub fn try_next(&mut self) -> Option<Sent> {
        self.from_client.try_recv().ok()
    }

    /// Next text frame, failing on a close
    pub async fn next_message(&mut self) -> (Instant, GatewayMessage) {
        match self.next().await {
            Sent::Text { at, message } => (at, message),
            Sent::Close { code, .. } => panic!("expected a frame, client closed with {code}"),
        }
    }

    /// Send Hello and read the Identify that must follow
    pub async fn handshake(&mut self) -> IdentifyPayload {
        self.hello();
        self.expect_identify().await
    }

    pub async fn expect_identify(&mut self) -> IdentifyPayload {
        let (_, message) = self.next_message().await;
        message
            .as_identify()
            .unwrap_or_else(|| panic!("expected Identify, got {message}"))
    }

    pub async fn expect_resume(&mut self) -> ResumePayload {
        let (_, message) = self.next_message().await;
        message
            .as_resume()
            .unwrap_or_else(|| panic!("expected Resume, got {message}"))
    }

    /// Next heartbeat and the sequence it carried
    pub async fn expect_heartbeat(&mut self) -> (Instant, Option<u64>) {
        let (at, message) = self.next_message().await;
        let seq = message
            .as_heartbeat_seq()
            .unwrap_or_else(|| panic!("expected Heartbeat, got {message}"));
        (at, seq)
    }

    pub async fn expect_op(&mut self, op: OpCode) -> GatewayMessage {
        let (_, message) = self.next_message().await;
        assert_eq!(message.op, op, "unexpected frame {message}");
        message
    }

    /// Skip frames until the client closes; returns when and with what code
    pub async fn expect_close(&mut self) -> (Instant, u16) {
        loop {
            if let Sent::Close { at, code } = self.next().await {
                return (at, code);
            }
        }
    }
}

/// Wait for the first event matching `predicate`
pub async fn wait_for<F>(events: &mut broadcast::Receiver<ShardEvent>, mut predicate: F) -> ShardEvent
where
    F: FnMut(&ShardEvent) -> bool,
{
    timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("event never arrived")
}

/// Wait for a dispatch carrying `sequence` on `shard_id`
pub async fn wait_for_sequence(events: &mut broadcast::Receiver<ShardEvent>, shard_id: u32, sequence: u64) {
    wait_for(events, |event| {
        matches!(event, ShardEvent::Dispatch { shard_id: id, sequence: Some(seq), .. } if *id == shard_id && *seq == sequence)
    })
    .await;
}

// ============================================================================
// Builders
// ============================================================================

pub fn gateway_config(max_concurrency: u32) -> GatewayConfig {
    GatewayConfig {
        url: GATEWAY_URL.to_string(),
        max_concurrency,
        ..GatewayConfig::default()
    }
}

pub fn shard_config(shard_count: u32, max_concurrency: u32) -> ShardConfig {
    ShardConfig {
        token: "token".to_string(),
        intents: GatewayIntents::default(),
        shard_count,
        gateway: gateway_config(max_concurrency),
        presence: None,
    }
}

/// A started coordinator is the caller's job; this only wires it
pub struct TestGateway {
    pub coordinator: ShardCoordinator,
    pub connector: Arc<FakeConnector>,
    pub accepted: Accepted,
    pub cache: Arc<EntityCache>,
    pub events: broadcast::Receiver<ShardEvent>,
}

impl TestGateway {
    pub fn new(shard_count: u32, max_concurrency: u32) -> Self {
        Self::with_attempts(shard_count, max_concurrency, 10)
    }

    pub fn with_attempts(shard_count: u32, max_concurrency: u32, max_reconnect_attempts: u32) -> Self {
        let (connector, accepted) = FakeConnector::new();
        let cache = Arc::new(EntityCache::new(CacheConfig::default()));
        let coordinator = ShardCoordinator::new(
            shard_config(shard_count, max_concurrency),
            max_reconnect_attempts,
            Arc::clone(&connector) as Arc<dyn Connector>,
            Arc::clone(&cache),
        );
        let events = coordinator.subscribe();

        Self {
            coordinator,
            connector,
            accepted,
            cache,
            events,
        }
    }

    /// Start shards and bring shard 0 of a single-shard setup to Connected
    pub async fn connect_single(&mut self) -> ServerConn {
        self.coordinator.start();
        let mut conn = self.accepted.next().await;
        conn.handshake().await;
        conn.ready(0, 1, 1);
        wait_for_sequence(&mut self.events, 0, 1).await;
        conn
    }
}

/// Client config with a fixed shard count pointed at the doubles
pub fn client_config(shards: ShardCount) -> ClientConfig {
    let mut config = ClientConfig::new("token");
    config.shards = shards;
    config.gateway = gateway_config(1);
    config
}

/// Build a client on top of the doubles
pub async fn client(
    shards: ShardCount,
    http: &Arc<MockHttp>,
    connector: &Arc<FakeConnector>,
) -> ClientResult<Client> {
    Client::builder(client_config(shards))
        .http_client(Arc::clone(http) as Arc<dyn HttpClient>)
        .connector(Arc::clone(connector) as Arc<dyn Connector>)
        .build()
        .await
}

// ============================================================================
// HTTP double
// ============================================================================

/// One scripted response
#[derive(Debug, Clone)]
pub struct Scripted {
    status: u16,
    headers: Vec<(String, String)>,
    body: Value,
    delay: Duration,
}

impl Scripted {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Answer only after `delay`
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request the client made
#[derive(Debug, Clone)]
pub struct Call {
    pub at: Instant,
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Scripted responses per path; unscripted paths answer 404
#[derive(Default)]
pub struct MockHttp {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<Call>>,
}

impl MockHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, status: u16, body: Value) {
        self.respond_with(path, Scripted::json(status, body));
    }

    pub fn respond_with(&self, path: &str, response: Scripted) {
        self.scripts
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    /// Requests made to `path`, in order
    pub fn calls(&self, path: &str) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.path == path)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HttpClient for MockHttp {
    async fn execute(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        let path = request
            .url
            .strip_prefix("https://discord.com/api/v10")
            .unwrap_or(&request.url)
            .to_string();
        let body = request
            .body
            .as_deref()
            .map(|body| serde_json::from_slice(body).unwrap_or(Value::Null));
        self.calls.lock().push(Call {
            at: Instant::now(),
            method: request.method.clone(),
            path: path.clone(),
            body,
        });

        let scripted = self.scripts.lock().get_mut(&path).and_then(VecDeque::pop_front);
        let scripted = scripted.unwrap_or_else(|| {
            Scripted::json(404, serde_json::json!({ "message": "Unknown", "code": 0 }))
        });
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }

        let mut response = HttpResponse::new(scripted.status);
        for (name, value) in &scripted.headers {
            response.headers.insert(
                HeaderName::from_bytes(name.as_bytes()).expect("header name"),
                HeaderValue::from_str(value).expect("header value"),
            );
        }
        response.body = scripted.body.to_string().into_bytes();
        Ok(response)
    }
}
