/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Deribit adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod types;
pub mod ws;

// Re-export commonly used types from auth
pub use auth::{Credentials, DeribitAuth};

// Re-export commonly used types from http
pub use http::{ClientConfig, DeribitClient, DeribitError, RestRequest, Result};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    BackoffConfig,
    Classified,
    Connector,
    EventReceiver,
    EventSender,
    InboundEvent,
    PrivateChannel,
    SessionConfig,
    SessionState,
    Transport,
    UserStreamSession,
    WsConnector,
    event_queue,
};
