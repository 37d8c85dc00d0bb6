/*
[INPUT]:  Test scenarios needing a controllable transport
[OUTPUT]: Scripted in-memory connector/transport, session fixtures
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for deribit-adapter tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use deribit_adapter::{
    BackoffConfig, ClientConfig, Connector, Credentials, DeribitAuth, DeribitClient, DeribitError,
    EventReceiver, Result, SessionConfig, SessionState, Transport, UserStreamSession, event_queue,
};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const MOCK_URL: &str = "wss://mock.invalid/ws/api/v2";

/// Server side of one mock connection, handed to the test on every connect
pub struct MockPeer {
    pub url: String,
    inbound: mpsc::UnboundedSender<std::result::Result<String, String>>,
    outbound: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
    stalled: Arc<AtomicBool>,
}

impl MockPeer {
    pub fn deliver(&self, message: Value) {
        self.deliver_raw(&message.to_string());
    }

    pub fn deliver_raw(&self, raw: &str) {
        let _ = self.inbound.send(Ok(raw.to_string()));
    }

    /// Make the session's next `receive` fail with a transport error
    pub fn fail(&self, reason: &str) {
        let _ = self.inbound.send(Err(reason.to_string()));
    }

    pub async fn next_sent(&mut self) -> Value {
        let raw = self
            .outbound
            .recv()
            .await
            .expect("session stopped sending");
        serde_json::from_str(&raw).expect("outbound frame is json")
    }

    pub async fn sent(&mut self, count: usize) -> Vec<Value> {
        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            frames.push(self.next_sent().await);
        }
        frames
    }

    pub fn try_next_sent(&mut self) -> Option<Value> {
        self.outbound
            .try_recv()
            .ok()
            .map(|raw| serde_json::from_str(&raw).expect("outbound frame is json"))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop reading: every later session send blocks forever
    pub fn stall_sends(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }
}

pub struct MockTransport {
    inbound: mpsc::UnboundedReceiver<std::result::Result<String, String>>,
    outbound: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
    stalled: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, payload: String) -> Result<()> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.outbound
            .send(payload)
            .map_err(|_| DeribitError::WebSocket("mock peer gone".to_string()))
    }

    async fn receive(&mut self) -> Result<String> {
        match self.inbound.recv().await {
            Some(Ok(raw)) => Ok(raw),
            Some(Err(reason)) => Err(DeribitError::WebSocket(reason)),
            None => Err(DeribitError::WebSocket("mock peer dropped".to_string())),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockConnector {
    peers: mpsc::UnboundedSender<MockPeer>,
    failing_connects: Arc<AtomicUsize>,
    hanging_connects: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, peer_rx) = mpsc::unbounded_channel();
        let connector = Self {
            peers,
            failing_connects: Arc::new(AtomicUsize::new(0)),
            hanging_connects: Arc::new(AtomicUsize::new(0)),
            connects: Arc::new(AtomicUsize::new(0)),
        };
        (connector, peer_rx)
    }

    /// Refuse the next `count` connection attempts
    pub fn fail_next_connects(&self, count: usize) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Never answer the next `count` connection attempts
    pub fn hang_next_connects(&self, count: usize) {
        self.hanging_connects.store(count, Ordering::SeqCst);
    }

    pub fn connect_counter(&self) -> Arc<AtomicUsize> {
        self.connects.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, url: &str, _idle_timeout: Duration) -> Result<MockTransport> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let refuse = self
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refuse {
            return Err(DeribitError::WebSocket("connection refused".to_string()));
        }

        let hang = self
            .hanging_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if hang {
            std::future::pending::<()>().await;
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let stalled = Arc::new(AtomicBool::new(false));

        let _ = self.peers.send(MockPeer {
            url: url.to_string(),
            inbound: inbound_tx,
            outbound: outbound_rx,
            closed: closed.clone(),
            stalled: stalled.clone(),
        });

        Ok(MockTransport {
            inbound: inbound_rx,
            outbound: outbound_tx,
            closed,
            stalled,
        })
    }
}

pub const FIXED_CLOCK_MS: i64 = 1_700_000_000_000;

pub async fn setup_mock_server() -> wiremock::MockServer {
    wiremock::MockServer::start().await
}

pub fn client_for(server: &wiremock::MockServer) -> DeribitClient {
    DeribitClient::with_config_and_base_url(
        ClientConfig::default(),
        &format!("{}/api/v2", server.uri()),
    )
    .expect("client init")
}

pub fn test_auth() -> DeribitAuth {
    DeribitAuth::new(Credentials::new("client-id", "client-secret")).expect("valid credentials")
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        url: MOCK_URL.to_string(),
        heartbeat_interval: Duration::from_secs(40),
        idle_timeout: Duration::from_secs(30),
        backoff: BackoffConfig {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            jitter: 0.0,
        },
    }
}

pub struct RunningSession {
    pub handle: JoinHandle<Result<()>>,
    pub events: EventReceiver,
    pub shutdown: CancellationToken,
    pub state: watch::Receiver<SessionState>,
}

pub fn spawn_session<C>(connector: C, config: SessionConfig) -> RunningSession
where
    C: Connector + 'static,
    C::Transport: 'static,
{
    let (sender, events) = event_queue();
    let shutdown = CancellationToken::new();
    let session = UserStreamSession::new(connector, test_auth(), config, sender, shutdown.clone());
    let state = session.subscribe_state();
    let handle = tokio::spawn(session.run());

    RunningSession {
        handle,
        events,
        shutdown,
        state,
    }
}

pub fn method_of(frame: &Value) -> &str {
    frame["method"].as_str().unwrap_or_default()
}

pub fn scope_of(frame: &Value) -> String {
    frame["params"]["scope"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}
