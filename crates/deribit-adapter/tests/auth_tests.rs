/*
[INPUT]:  Credential pairs and REST requests
[OUTPUT]: Test results for the credential signer
[POS]:    Integration tests - authentication
[UPDATE]: When auth params, scope format or header format change
*/

mod common;

use std::collections::HashSet;

use common::{FIXED_CLOCK_MS, test_auth};
use deribit_adapter::auth::{SCOPE_NONCE_LEN, SESSION_EXPIRY_SECONDS};
use deribit_adapter::{Credentials, DeribitAuth, DeribitError, RestRequest};
use tokio_test::assert_ok;

#[test]
fn test_credentials_validation() {
    assert_ok!(Credentials::new("id", "secret").validate());
    assert!(matches!(
        Credentials::new(" ", "secret").validate(),
        Err(DeribitError::Config(_))
    ));
    assert!(matches!(
        DeribitAuth::new(Credentials::new("id", "")),
        Err(DeribitError::Config(_))
    ));
}

#[test]
fn test_credentials_debug_is_redacted() {
    let rendered = format!("{:?}", Credentials::new("visible-id", "hidden-secret"));
    assert!(rendered.contains("visible-id"));
    assert!(!rendered.contains("hidden-secret"));
}

#[test]
fn test_handshake_scope_format() {
    let auth = test_auth().with_scope_prefix("desk");
    let scope = auth.handshake_payload().params.scope;

    let expected_suffix = format!(" expires:{SESSION_EXPIRY_SECONDS}");
    let nonce = scope
        .strip_prefix("session:desk-")
        .and_then(|rest| rest.strip_suffix(expected_suffix.as_str()))
        .expect("scope format");
    assert_eq!(nonce.len(), SCOPE_NONCE_LEN);
    assert_eq!(SESSION_EXPIRY_SECONDS, 2_592_000);
}

#[test]
fn test_handshake_nonces_do_not_repeat() {
    let auth = test_auth();
    let scopes: HashSet<String> = (0..64)
        .map(|_| auth.handshake_payload().params.scope)
        .collect();
    assert_eq!(scopes.len(), 64);
}

#[test]
fn test_handshake_serializes_as_public_auth() {
    let value = serde_json::to_value(test_auth().handshake_payload()).unwrap();
    assert_eq!(value["jsonrpc"], "2.0");
    assert_eq!(value["id"], 0);
    assert_eq!(value["method"], "public/auth");
    assert_eq!(value["params"]["grant_type"], "client_credentials");
}

#[test]
fn test_sign_unary_uses_injected_clock() {
    let auth = test_auth().with_clock(|| FIXED_CLOCK_MS);
    let signed = assert_ok!(auth.sign_unary(RestRequest::get("/private/get_positions")));

    assert_eq!(signed.query["timestamp"], FIXED_CLOCK_MS);
    assert_eq!(signed.method, reqwest::Method::GET);
    assert_eq!(signed.path, "/private/get_positions");
}
