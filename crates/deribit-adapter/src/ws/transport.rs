/*
[INPUT]:  WebSocket URL, transport idle timeout, outbound text frames
[OUTPUT]: Connected duplex transport yielding inbound text frames
[POS]:    WebSocket layer - transport seam between session and network
[UPDATE]: When changing transport keep-alive or frame handling
*/

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use url::Url;

use crate::http::{DeribitError, Result};

/// One open duplex connection, exclusively owned by a session
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, payload: String) -> Result<()>;

    /// Next inbound text payload.
    ///
    /// Must be cancel safe: the session races it against the heartbeat deadline.
    async fn receive(&mut self) -> Result<String>;

    async fn close(&mut self) -> Result<()>;
}

/// Opens transports; a fresh one per connection attempt
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    async fn connect(&self, url: &str, idle_timeout: Duration) -> Result<Self::Transport>;
}

/// tokio-tungstenite backed connector
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, url: &str, idle_timeout: Duration) -> Result<WsTransport> {
        let url = Url::parse(url)?;
        debug!(%url, ?idle_timeout, "opening websocket");
        // A peer that accepts TCP but never completes the upgrade must not hang the caller.
        let (stream, _response) = tokio::time::timeout(idle_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| DeribitError::Timeout {
                duration: idle_timeout.as_secs(),
            })?
            .map_err(DeribitError::websocket)?;
        Ok(WsTransport::new(stream, idle_timeout))
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport with protocol-level keep-alive.
///
/// After `idle_timeout` without any inbound frame a ping is sent; if a second
/// window passes with nothing received the transport fails with `Timeout`.
pub struct WsTransport {
    stream: WsStream,
    idle_timeout: Duration,
    last_frame_at: Instant,
    ping_outstanding: bool,
}

impl WsTransport {
    pub fn new(stream: WsStream, idle_timeout: Duration) -> Self {
        Self {
            stream,
            idle_timeout,
            last_frame_at: Instant::now(),
            ping_outstanding: false,
        }
    }

    /// Write one frame; a peer that stops reading fails with `Timeout` after `idle_timeout`
    async fn send_frame(&mut self, frame: WsMessage) -> Result<()> {
        match tokio::time::timeout(self.idle_timeout, self.stream.send(frame)).await {
            Ok(sent) => sent.map_err(DeribitError::websocket),
            Err(_) => Err(DeribitError::Timeout {
                duration: self.idle_timeout.as_secs(),
            }),
        }
    }

    async fn on_idle(&mut self) -> Result<()> {
        if self.ping_outstanding {
            return Err(DeribitError::Timeout {
                duration: (self.idle_timeout * 2).as_secs(),
            });
        }

        trace!("websocket idle, sending ping");
        self.send_frame(WsMessage::Ping(Vec::<u8>::new().into())).await?;
        self.ping_outstanding = true;
        self.last_frame_at = Instant::now();
        Ok(())
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, payload: String) -> Result<()> {
        self.send_frame(WsMessage::Text(payload.into())).await
    }

    async fn receive(&mut self) -> Result<String> {
        loop {
            let idle_deadline = self.last_frame_at + self.idle_timeout;
            let frame = match tokio::time::timeout_at(idle_deadline, self.stream.next()).await {
                Ok(frame) => frame,
                Err(_) => {
                    self.on_idle().await?;
                    continue;
                }
            };

            self.last_frame_at = Instant::now();
            self.ping_outstanding = false;

            match frame {
                Some(Ok(WsMessage::Text(text))) => return Ok(text.to_string()),
                Some(Ok(WsMessage::Binary(bytes))) => {
                    return String::from_utf8(bytes.to_vec()).map_err(|err| {
                        DeribitError::Protocol(format!("binary frame is not utf-8: {err}"))
                    });
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    return Err(DeribitError::WebSocket(format!(
                        "connection closed by peer: {frame:?}"
                    )));
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(DeribitError::websocket(err)),
                None => return Err(DeribitError::WebSocket("stream ended".to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await.map_err(DeribitError::websocket)
    }
}
