/*
[INPUT]:  Credentials, REST requests, millisecond clock
[OUTPUT]: Basic-auth decorated requests and `public/auth` handshake payloads
[POS]:    Auth layer - credential signer for REST and WebSocket
[UPDATE]: When changing auth params, scope format or header format
*/

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::Rng;
use serde_json::{Map, Value};
use tracing::debug;

use crate::auth::Credentials;
use crate::http::{RestRequest, Result};
use crate::ws::message::{AUTH_METHOD, AuthParams, HANDSHAKE_REQUEST_ID, JsonRpcRequest};

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const GRANT_TYPE: &str = "client_credentials";
pub const DEFAULT_SCOPE_PREFIX: &str = "rsbot";
/// Session scope lifetime requested in the handshake (30 days)
pub const SESSION_EXPIRY_SECONDS: u64 = 30 * 24 * 60 * 60;
pub const SCOPE_NONCE_LEN: usize = 8;

const NONCE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Credential signer shared by the REST client and the user stream session
#[derive(Debug, Clone)]
pub struct DeribitAuth {
    credentials: Credentials,
    scope_prefix: String,
    clock: fn() -> i64,
}

impl DeribitAuth {
    pub fn new(credentials: Credentials) -> Result<Self> {
        credentials.validate()?;
        Ok(Self {
            credentials,
            scope_prefix: DEFAULT_SCOPE_PREFIX.to_string(),
            clock: now_millis,
        })
    }

    /// Replace the millisecond clock used for the `timestamp` auth param
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_scope_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.scope_prefix = prefix.into();
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// `Authorization: Basic base64(client_id:client_secret)`
    pub fn authentication_headers(&self) -> Vec<(String, String)> {
        let pair = format!(
            "{}:{}",
            self.credentials.client_id(),
            self.credentials.client_secret()
        );
        vec![(
            AUTHORIZATION_HEADER.to_string(),
            format!("Basic {}", BASE64.encode(pair)),
        )]
    }

    fn auth_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("timestamp".to_string(), Value::from((self.clock)()));
        params
    }

    /// Return a decorated copy of `request`.
    ///
    /// Auth params land in the body for write methods and in the query string
    /// otherwise. Existing headers are kept; any prior Authorization header is
    /// replaced.
    pub fn sign_unary(&self, request: RestRequest) -> Result<RestRequest> {
        self.credentials.validate()?;

        let mut request = request;
        let params = self.auth_params();
        if request.is_write() {
            request.body.get_or_insert_with(Map::new).extend(params);
        } else {
            request.query.extend(params);
        }

        request
            .headers
            .retain(|name, _| !name.eq_ignore_ascii_case(AUTHORIZATION_HEADER));
        request.headers.extend(self.authentication_headers());

        Ok(request)
    }

    /// Build a fresh `public/auth` request. Never cache the result: each
    /// connection attempt needs its own scope nonce.
    pub fn handshake_payload(&self) -> JsonRpcRequest<AuthParams> {
        let scope = format!(
            "session:{}-{} expires:{}",
            self.scope_prefix,
            scope_nonce(),
            SESSION_EXPIRY_SECONDS
        );
        debug!(%scope, "ws handshake payload built");

        JsonRpcRequest::with_id(
            HANDSHAKE_REQUEST_ID,
            AUTH_METHOD,
            AuthParams {
                grant_type: GRANT_TYPE.to_string(),
                scope,
                client_id: self.credentials.client_id().to_string(),
                client_secret: self.credentials.client_secret().to_string(),
            },
        )
    }
}

fn scope_nonce() -> String {
    let mut rng = rand::thread_rng();
    (0..SCOPE_NONCE_LEN)
        .map(|_| NONCE_ALPHABET[rng.gen_range(0..NONCE_ALPHABET.len())] as char)
        .collect()
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
