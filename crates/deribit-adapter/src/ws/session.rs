/*
[INPUT]:  Connector, DeribitAuth, SessionConfig, event sender, shutdown token
[OUTPUT]: Private order/balance events pushed to the output queue; state updates via `watch`
[POS]:    WebSocket layer - authenticated user stream session lifecycle
[UPDATE]: When changing handshake order, heartbeat policy, reconnect backoff or shutdown semantics
*/

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::auth::DeribitAuth;
use crate::http::{DeribitError, Result};
use crate::types::Domain;
use crate::ws::classifier::{Classified, DropReason, classify_text};
use crate::ws::heartbeat::{HEARTBEAT_INTERVAL, TRANSPORT_IDLE_TIMEOUT, heartbeat_request, test_response};
use crate::ws::message::{
    AUTH_METHOD, HANDSHAKE_REQUEST_ID, OutboundRequest, PRIVATE_CHANNELS, subscribe_request,
};
use crate::ws::queue::EventSender;
use crate::ws::transport::{Connector, Transport};

const DEFAULT_BACKOFF_INITIAL: Duration = Duration::from_millis(500);
const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF_JITTER: f64 = 0.2;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Handshake error code for a rejected client id/secret pair
const INVALID_CREDENTIALS_CODE: i64 = 13004;

const UNRECOGNIZED_LOG_LIMIT: usize = 3;
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

static UNRECOGNIZED_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);
static PARSE_FAIL_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    Subscribing,
    Live,
    Closing,
}

/// Delay policy between reconnect attempts. Attempts are unbounded; the delay is not.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
    /// Fraction of the delay randomised in both directions, clamped to `0.0..=1.0`
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: DEFAULT_BACKOFF_INITIAL,
            max: DEFAULT_BACKOFF_MAX,
            jitter: DEFAULT_BACKOFF_JITTER,
        }
    }
}

impl BackoffConfig {
    /// Exponential delay before jitter; `retry_count` starts at 1
    pub fn base_delay(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::ZERO;
        }
        let exp = retry_count.saturating_sub(1).min(31);
        self.initial
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max)
            .min(self.max)
    }

    pub fn delay(&self, retry_count: u32) -> Duration {
        let base = self.base_delay(retry_count);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if base.is_zero() || jitter == 0.0 {
            return base;
        }
        let factor = rand::thread_rng().gen_range(1.0 - jitter..=1.0 + jitter);
        base.mul_f64(factor).min(self.max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub url: String,
    pub heartbeat_interval: Duration,
    pub idle_timeout: Duration,
    pub backoff: BackoffConfig,
}

impl SessionConfig {
    pub fn for_domain(domain: Domain) -> Self {
        Self {
            url: domain.ws_url().to_string(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            idle_timeout: TRANSPORT_IDLE_TIMEOUT,
            backoff: BackoffConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::for_domain(Domain::Main)
    }
}

#[derive(Debug)]
enum StreamExit {
    Disconnected(DeribitError),
    Shutdown,
}

/// Per-connection send path. Tracks the handshake and the last outbound send.
struct Link<'a, T: Transport> {
    transport: &'a mut T,
    authenticated: bool,
    last_sent: Instant,
    send_timeout: Duration,
}

impl<T: Transport> Link<'_, T> {
    async fn send(&mut self, request: OutboundRequest) -> Result<()> {
        if request.requires_auth && !self.authenticated {
            return Err(DeribitError::Authentication {
                message: format!("{} attempted before handshake", request.method),
            });
        }

        // A peer that stops reading must not stall the heartbeat loop.
        match tokio::time::timeout(self.send_timeout, self.transport.send(request.payload)).await {
            Ok(sent) => sent?,
            Err(_) => {
                return Err(DeribitError::Timeout {
                    duration: self.send_timeout.as_secs(),
                });
            }
        }
        self.last_sent = Instant::now();
        if request.method == AUTH_METHOD {
            self.authenticated = true;
        }
        trace!(id = request.id, method = %request.method, "ws request sent");
        Ok(())
    }
}

/// Authenticated private user stream.
///
/// One instance owns one logical session: it connects, authenticates,
/// negotiates the heartbeat, subscribes to the private channels and then
/// forwards private events until shutdown, reconnecting on any transport error.
pub struct UserStreamSession<C: Connector> {
    connector: C,
    auth: DeribitAuth,
    config: SessionConfig,
    events: EventSender,
    shutdown: CancellationToken,
    state: watch::Sender<SessionState>,
    retry_count: u32,
}

impl<C: Connector> UserStreamSession<C> {
    pub fn new(
        connector: C,
        auth: DeribitAuth,
        config: SessionConfig,
        events: EventSender,
        shutdown: CancellationToken,
    ) -> Self {
        let (state, _rx) = watch::channel(SessionState::Disconnected);
        Self {
            connector,
            auth,
            config,
            events,
            shutdown,
            state,
            retry_count: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Subscribe to state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run until the shutdown token is cancelled (`Ok`) or a fatal error occurs (`Err`).
    ///
    /// Transport errors never end the loop; they are logged and followed by a
    /// reconnect after the backoff delay. Connect and send are bounded by
    /// `idle_timeout`.
    pub async fn run(mut self) -> Result<()> {
        if let Err(err) = self.preflight() {
            error!(error = %err, "user stream session misconfigured");
            return Err(err);
        }

        loop {
            match self.connect_and_stream().await {
                StreamExit::Shutdown => {
                    self.set_state(SessionState::Disconnected);
                    info!("user stream session stopped");
                    return Ok(());
                }
                StreamExit::Disconnected(err) if err.is_fatal() => {
                    self.set_state(SessionState::Disconnected);
                    error!(error = %err, "user stream session failed");
                    return Err(err);
                }
                StreamExit::Disconnected(err) => {
                    self.set_state(SessionState::Disconnected);
                    self.retry_count = self.retry_count.saturating_add(1);
                    let backoff = self.config.backoff.delay(self.retry_count);
                    warn!(
                        retry_count = self.retry_count,
                        ?backoff,
                        error = %err,
                        "user stream disconnected; reconnecting"
                    );

                    tokio::select! {
                        biased;
                        _ = self.shutdown.cancelled() => {
                            info!("user stream session stopped");
                            return Ok(());
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }
    }

    fn preflight(&self) -> Result<()> {
        self.auth.credentials().validate()?;
        Url::parse(&self.config.url)?;
        Ok(())
    }

    fn set_state(&self, next: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = ?*current, to = ?next, "user stream state");
            *current = next;
            true
        });
    }

    async fn connect_and_stream(&mut self) -> StreamExit {
        let shutdown = self.shutdown.clone();
        if shutdown.is_cancelled() {
            return StreamExit::Shutdown;
        }

        self.set_state(SessionState::Connecting);
        info!(url = %self.config.url, "connecting user stream");

        let connect_timeout = self.config.idle_timeout;
        let connected = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return StreamExit::Shutdown,
            connected = tokio::time::timeout(
                connect_timeout,
                self.connector.connect(&self.config.url, self.config.idle_timeout),
            ) => connected,
        };
        let mut transport = match connected {
            Ok(Ok(transport)) => transport,
            Ok(Err(err)) => return StreamExit::Disconnected(err),
            Err(_) => {
                return StreamExit::Disconnected(DeribitError::Timeout {
                    duration: connect_timeout.as_secs(),
                });
            }
        };

        let exit = tokio::select! {
            biased;
            _ = shutdown.cancelled() => StreamExit::Shutdown,
            result = self.stream(&mut transport) => match result {
                Err(err) => StreamExit::Disconnected(err),
                Ok(never) => match never {},
            },
        };

        self.set_state(SessionState::Closing);
        match tokio::time::timeout(CLOSE_TIMEOUT, transport.close()).await {
            Ok(Ok(())) => debug!("user stream transport closed"),
            Ok(Err(err)) => debug!(error = %err, "user stream transport close failed"),
            Err(_) => debug!(timeout = ?CLOSE_TIMEOUT, "user stream transport close timed out"),
        }
        exit
    }

    async fn stream<T: Transport>(&mut self, transport: &mut T) -> Result<Infallible> {
        let interval = self.config.heartbeat_interval;
        let mut link = Link {
            transport,
            authenticated: false,
            last_sent: Instant::now(),
            send_timeout: self.config.idle_timeout,
        };

        self.set_state(SessionState::Authenticating);
        link.send(OutboundRequest::public(&self.auth.handshake_payload())?)
            .await?;

        self.set_state(SessionState::Subscribing);
        link.send(OutboundRequest::public(&heartbeat_request(interval))?)
            .await?;
        for channel in PRIVATE_CHANNELS {
            link.send(OutboundRequest::private(&subscribe_request(channel))?)
                .await?;
        }

        link.last_sent = Instant::now();
        self.set_state(SessionState::Live);
        info!("Subscribed to private order changes and balance updates channels");

        loop {
            let deadline = link.last_sent + interval;
            let received = tokio::time::timeout_at(deadline, link.transport.receive()).await;
            match received {
                Err(_elapsed) => {
                    debug!(?interval, "no outbound traffic within heartbeat interval; sending heartbeat");
                    link.send(OutboundRequest::public(&heartbeat_request(interval))?)
                        .await?;
                }
                Ok(Err(DeribitError::Protocol(message))) => {
                    warn!(%message, "dropping undecodable ws frame");
                }
                Ok(Err(err)) => return Err(err),
                Ok(Ok(raw)) => self.dispatch(&mut link, &raw).await?,
            }
        }
    }

    async fn dispatch<T: Transport>(&mut self, link: &mut Link<'_, T>, raw: &str) -> Result<()> {
        let classified = match classify_text(raw) {
            Ok(classified) => classified,
            Err(err) => {
                log_parse_fail_once(&err, raw);
                return Ok(());
            }
        };

        match classified {
            Classified::Forward(event) => {
                trace!(subject = event.subject(), "forwarding private event");
                self.events.push(event)
            }
            Classified::TestRequest => {
                debug!("answering heartbeat test_request");
                link.send(OutboundRequest::public(&test_response())?).await
            }
            Classified::Drop(DropReason::RpcResult {
                id: Some(HANDSHAKE_REQUEST_ID),
            }) => {
                info!("user stream authenticated");
                self.retry_count = 0;
                Ok(())
            }
            Classified::Drop(DropReason::RpcError {
                id: Some(HANDSHAKE_REQUEST_ID),
                code: INVALID_CREDENTIALS_CODE,
                message,
            }) => Err(DeribitError::Config(format!(
                "credentials rejected by server (code {INVALID_CREDENTIALS_CODE}): {message}"
            ))),
            Classified::Drop(DropReason::RpcError {
                id: Some(HANDSHAKE_REQUEST_ID),
                code,
                message,
            }) => Err(DeribitError::Authentication {
                message: format!("handshake rejected (code {code}): {message}"),
            }),
            Classified::Drop(DropReason::RpcError { id, code, message }) => {
                warn!(?id, code, %message, "ws request rejected");
                Ok(())
            }
            Classified::Drop(DropReason::RpcResult { id }) => {
                debug!(?id, "ws request acknowledged");
                Ok(())
            }
            Classified::Drop(DropReason::Heartbeat) => {
                trace!("heartbeat received");
                Ok(())
            }
            Classified::Drop(reason) => {
                log_unrecognized_once(&reason, raw);
                Ok(())
            }
        }
    }
}

fn log_unrecognized_once(reason: &DropReason, raw: &str) {
    let count = UNRECOGNIZED_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < UNRECOGNIZED_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = UNRECOGNIZED_LOG_LIMIT,
            ?reason,
            bytes = raw.len(),
            "ws message dropped"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = UNRECOGNIZED_LOG_LIMIT,
            message = %preview,
            "ws message dropped"
        );
    } else {
        trace!(?reason, "ws message dropped");
    }
}

fn log_parse_fail_once(err: &DeribitError, raw: &str) {
    let count = PARSE_FAIL_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < PARSE_FAIL_LOG_LIMIT {
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        warn!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            bytes = raw.len(),
            message = %preview,
            "ws message parse failed"
        );
    } else {
        debug!(error = %err, bytes = raw.len(), "ws message parse failed");
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}
