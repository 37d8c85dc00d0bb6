/*
[INPUT]:  Desired heartbeat interval
[OUTPUT]: `public/set_heartbeat` and `public/test` control requests
[POS]:    WebSocket layer - heartbeat negotiation with the server
[UPDATE]: When heartbeat cadence or control methods change
*/

use std::time::Duration;

use crate::ws::message::{
    HeartbeatParams, JsonRpcRequest, SET_HEARTBEAT_METHOD, TEST_METHOD, TestParams,
};

/// Application heartbeat cadence negotiated on every connection
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(40);

/// Transport-level idle window before a websocket ping is sent
pub const TRANSPORT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Smallest interval the server accepts for `public/set_heartbeat`
pub const MIN_HEARTBEAT_SECS: u64 = 10;

/// Interval in whole seconds as sent on the wire
pub fn heartbeat_secs(interval: Duration) -> u64 {
    interval.as_secs().max(MIN_HEARTBEAT_SECS)
}

/// Ask the server to run its liveness checks at `interval`.
///
/// The setting does not survive a reconnect, so this is sent on every new
/// connection and reused as the local keep-alive ping.
pub fn heartbeat_request(interval: Duration) -> JsonRpcRequest<HeartbeatParams> {
    JsonRpcRequest::new(
        SET_HEARTBEAT_METHOD,
        HeartbeatParams {
            interval: heartbeat_secs(interval),
        },
    )
}

/// Reply to a server `test_request`
pub fn test_response() -> JsonRpcRequest<TestParams> {
    JsonRpcRequest::new(TEST_METHOD, TestParams::default())
}
