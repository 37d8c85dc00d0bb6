/*
[INPUT]:  API client id and client secret
[OUTPUT]: Validated, immutable credential pair
[POS]:    Auth layer - credential storage for signer and handshake
[UPDATE]: When credential fields or validation rules change
*/

use std::fmt;

use crate::http::{DeribitError, Result};

/// API key pair used for both the websocket handshake and REST basic auth
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Reject missing fields up front; these are never retried
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(DeribitError::Config("client_id is empty".to_string()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(DeribitError::Config("client_secret is empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}
