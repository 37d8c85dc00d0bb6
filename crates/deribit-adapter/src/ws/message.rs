/*
[INPUT]:  Outbound request parameters and raw inbound JSON
[OUTPUT]: JSON-RPC 2.0 request envelopes, private channel set, InboundEvent
[POS]:    WebSocket layer - wire message shapes and message id generation
[UPDATE]: When adding new channels, methods or changing envelope format
*/

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::Result;

pub const JSONRPC_VERSION: &str = "2.0";

pub const AUTH_METHOD: &str = "public/auth";
pub const SET_HEARTBEAT_METHOD: &str = "public/set_heartbeat";
pub const TEST_METHOD: &str = "public/test";
pub const SUBSCRIBE_METHOD: &str = "private/subscribe";

/// The handshake always uses this id instead of drawing from the generator
pub const HANDSHAKE_REQUEST_ID: u64 = 0;

pub const ORDER_CHANGE_CHANNEL: &str = "user.changes.spot.any.raw";
pub const BALANCE_CHANNEL: &str = "user.portfolio.any";

static MESSAGE_ID: AtomicU64 = AtomicU64::new(0);

/// Next id from the process-wide generator shared by every session.
///
/// Starts at zero and is never reset, so the first id handed out is 1.
pub fn next_message_id() -> u64 {
    MESSAGE_ID.fetch_add(1, Ordering::Relaxed) + 1
}

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest<P> {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: P,
}

impl<P: Serialize> JsonRpcRequest<P> {
    /// Build a request with an id drawn from [`next_message_id`]
    pub fn new(method: impl Into<String>, params: P) -> Self {
        Self::with_id(next_message_id(), method, params)
    }

    pub fn with_id(id: u64, method: impl Into<String>, params: P) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// `public/auth` parameters for the client credentials grant
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParams {
    pub grant_type: String,
    pub scope: String,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for AuthParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthParams")
            .field("grant_type", &self.grant_type)
            .field("scope", &self.scope)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatParams {
    pub interval: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeParams {
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestParams {}

/// Private channels this stream subscribes to on every connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrivateChannel {
    OrderChanges,
    Portfolio,
}

/// Fixed subscription set, in send order
pub const PRIVATE_CHANNELS: [PrivateChannel; 2] =
    [PrivateChannel::OrderChanges, PrivateChannel::Portfolio];

impl PrivateChannel {
    pub fn name(self) -> &'static str {
        match self {
            PrivateChannel::OrderChanges => ORDER_CHANGE_CHANNEL,
            PrivateChannel::Portfolio => BALANCE_CHANNEL,
        }
    }

    /// Inbound events carry the channel name as their `subject`
    pub fn from_subject(subject: &str) -> Option<Self> {
        PRIVATE_CHANNELS
            .into_iter()
            .find(|channel| channel.name() == subject)
    }
}

pub fn subscribe_request(channel: PrivateChannel) -> JsonRpcRequest<SubscribeParams> {
    JsonRpcRequest::new(
        SUBSCRIBE_METHOD,
        SubscribeParams {
            channels: vec![channel.name().to_string()],
        },
    )
}

/// Serialized outbound frame plus the metadata the session needs to send it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub id: u64,
    pub method: String,
    pub payload: String,
    pub requires_auth: bool,
}

impl OutboundRequest {
    pub fn public<P: Serialize>(request: &JsonRpcRequest<P>) -> Result<Self> {
        Self::from_rpc(request, false)
    }

    pub fn private<P: Serialize>(request: &JsonRpcRequest<P>) -> Result<Self> {
        Self::from_rpc(request, true)
    }

    fn from_rpc<P: Serialize>(request: &JsonRpcRequest<P>, requires_auth: bool) -> Result<Self> {
        Ok(Self {
            id: request.id,
            method: request.method.clone(),
            payload: request.to_json()?,
            requires_auth,
        })
    }
}

/// A private event accepted for the consumer. `message` is the inbound JSON, untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub channel: PrivateChannel,
    pub message: Value,
}

impl InboundEvent {
    pub fn kind(&self) -> &str {
        self.message
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn subject(&self) -> &str {
        self.channel.name()
    }

    /// Event body; Deribit carries it under `data`
    pub fn payload(&self) -> Option<&Value> {
        self.message.get("data")
    }

    pub fn into_message(self) -> Value {
        self.message
    }
}
