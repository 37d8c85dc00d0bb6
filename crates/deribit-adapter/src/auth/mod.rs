/*
[INPUT]:  API credentials (client id / client secret)
[OUTPUT]: Handshake payloads and decorated REST requests
[POS]:    Auth layer - handles Deribit API authentication
[UPDATE]: When auth flow or credential handling changes
*/

pub mod credentials;
pub mod signer;

pub use credentials::Credentials;
pub use signer::{DEFAULT_SCOPE_PREFIX, DeribitAuth, SESSION_EXPIRY_SECONDS, SCOPE_NONCE_LEN};
