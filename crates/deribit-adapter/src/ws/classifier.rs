/*
[INPUT]:  Raw inbound WebSocket text / parsed JSON values
[OUTPUT]: Forward / TestRequest / Drop decisions
[POS]:    WebSocket layer - inbound event classification
[UPDATE]: When recognized subjects or control message shapes change
*/

use serde_json::Value;

use crate::http::{DeribitError, Result};
use crate::ws::message::{InboundEvent, PrivateChannel};

const EVENT_TYPE_MESSAGE: &str = "message";
const HEARTBEAT_METHOD: &str = "heartbeat";
const TEST_REQUEST_TYPE: &str = "test_request";

#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// Private order or balance event for the consumer
    Forward(InboundEvent),
    /// Server liveness check; answer with `public/test`
    TestRequest,
    Drop(DropReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    Empty,
    NotAnObject,
    Heartbeat,
    RpcResult { id: Option<u64> },
    RpcError { id: Option<u64>, code: i64, message: String },
    Irrelevant,
}

/// Decide what to do with one inbound message.
///
/// Only `type == "message"` objects whose `subject` names one of the private
/// channels are forwarded; everything else is control traffic or noise.
pub fn classify(message: Value) -> Classified {
    let Some(object) = message.as_object() else {
        return Classified::Drop(DropReason::NotAnObject);
    };
    if object.is_empty() {
        return Classified::Drop(DropReason::Empty);
    }

    if object.get("type").and_then(Value::as_str) == Some(EVENT_TYPE_MESSAGE) {
        let channel = object
            .get("subject")
            .and_then(Value::as_str)
            .and_then(PrivateChannel::from_subject);
        return match channel {
            Some(channel) => Classified::Forward(InboundEvent { channel, message }),
            None => Classified::Drop(DropReason::Irrelevant),
        };
    }

    if object.get("method").and_then(Value::as_str) == Some(HEARTBEAT_METHOD) {
        let kind = object
            .get("params")
            .and_then(|params| params.get("type"))
            .and_then(Value::as_str);
        return if kind == Some(TEST_REQUEST_TYPE) {
            Classified::TestRequest
        } else {
            Classified::Drop(DropReason::Heartbeat)
        };
    }

    let id = object.get("id").and_then(Value::as_u64);
    if let Some(error) = object.get("error") {
        return Classified::Drop(DropReason::RpcError {
            id,
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }
    if object.contains_key("result") {
        return Classified::Drop(DropReason::RpcResult { id });
    }

    Classified::Drop(DropReason::Irrelevant)
}

/// Parse and classify a text frame; unparseable input is a protocol error
pub fn classify_text(raw: &str) -> Result<Classified> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| DeribitError::Protocol(format!("malformed inbound message: {err}")))?;
    Ok(classify(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::order_change("user.changes.spot.any.raw", PrivateChannel::OrderChanges)]
    #[case::balance("user.portfolio.any", PrivateChannel::Portfolio)]
    fn forwards_private_subjects(#[case] subject: &str, #[case] expected: PrivateChannel) {
        let message = json!({ "type": "message", "subject": subject, "data": { "x": 1 } });

        match classify(message.clone()) {
            Classified::Forward(event) => {
                assert_eq!(event.channel, expected);
                assert_eq!(event.message, message);
                assert_eq!(event.kind(), "message");
                assert_eq!(event.subject(), subject);
            }
            other => panic!("expected forward, got {other:?}"),
        }
    }

    #[rstest]
    #[case::empty(json!({}), DropReason::Empty)]
    #[case::array(json!([1, 2, 3]), DropReason::NotAnObject)]
    #[case::string(json!("message"), DropReason::NotAnObject)]
    #[case::announcement(json!({ "type": "announcement" }), DropReason::Irrelevant)]
    #[case::unknown_subject(
        json!({ "type": "message", "subject": "ticker.BTC-PERPETUAL.raw" }),
        DropReason::Irrelevant
    )]
    #[case::missing_subject(json!({ "type": "message" }), DropReason::Irrelevant)]
    #[case::wrong_type(
        json!({ "type": "update", "subject": "user.portfolio.any" }),
        DropReason::Irrelevant
    )]
    #[case::subscription_ack(
        json!({ "jsonrpc": "2.0", "id": 7, "result": ["user.portfolio.any"] }),
        DropReason::RpcResult { id: Some(7) }
    )]
    #[case::auth_response(
        json!({ "jsonrpc": "2.0", "id": 0, "result": { "access_token": "t" } }),
        DropReason::RpcResult { id: Some(0) }
    )]
    #[case::heartbeat(
        json!({ "jsonrpc": "2.0", "method": "heartbeat", "params": { "type": "heartbeat" } }),
        DropReason::Heartbeat
    )]
    fn drops_everything_else(#[case] message: Value, #[case] expected: DropReason) {
        assert_eq!(classify(message), Classified::Drop(expected));
    }

    #[test]
    fn rpc_error_keeps_code_and_message() {
        let message = json!({
            "jsonrpc": "2.0",
            "id": 0,
            "error": { "code": 13004, "message": "invalid_credentials" }
        });

        assert_eq!(
            classify(message),
            Classified::Drop(DropReason::RpcError {
                id: Some(0),
                code: 13004,
                message: "invalid_credentials".to_string(),
            })
        );
    }

    #[test]
    fn test_request_is_recognized() {
        let message = json!({
            "jsonrpc": "2.0",
            "method": "heartbeat",
            "params": { "type": "test_request" }
        });
        assert_eq!(classify(message), Classified::TestRequest);
    }

    #[test]
    fn classify_text_reports_malformed_json() {
        let err = classify_text("{not json").unwrap_err();
        assert!(matches!(err, DeribitError::Protocol(_)));

        let ok = classify_text(r#"{"type":"announcement"}"#).unwrap();
        assert_eq!(ok, Classified::Drop(DropReason::Irrelevant));
    }
}
