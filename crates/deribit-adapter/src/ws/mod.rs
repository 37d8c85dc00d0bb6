/*
[INPUT]:  Session configuration, credentials and a transport connector
[OUTPUT]: Private order and balance events on an ordered queue
[POS]:    WebSocket layer - authenticated user stream
[UPDATE]: When adding new channels or changing connection logic
*/

pub mod classifier;
pub mod heartbeat;
pub mod message;
pub mod queue;
pub mod session;
pub mod transport;

pub use classifier::{Classified, DropReason, classify, classify_text};
pub use heartbeat::{HEARTBEAT_INTERVAL, TRANSPORT_IDLE_TIMEOUT, heartbeat_request, test_response};
pub use message::{
    InboundEvent, JsonRpcRequest, OutboundRequest, PRIVATE_CHANNELS, PrivateChannel,
    next_message_id, subscribe_request,
};
pub use queue::{EventReceiver, EventSender, event_queue};
pub use session::{BackoffConfig, SessionConfig, SessionState, UserStreamSession};
pub use transport::{Connector, Transport, WsConnector, WsTransport};
