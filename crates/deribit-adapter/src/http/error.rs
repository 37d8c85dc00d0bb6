/*
[INPUT]:  Error sources (HTTP, API, serialization, auth, WebSocket, session)
[OUTPUT]: Structured error types with retry and fatality hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or changing reconnect semantics
*/

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the Deribit adapter
#[derive(Error, Debug)]
pub enum DeribitError {
    /// Missing or empty configuration, never retried
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a JSON-RPC error object
    #[error("API error (code {code}): {message}")]
    Api { code: i64, message: String },

    /// Authentication was rejected or attempted out of order
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// WebSocket connect, send, receive or close failure
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Transport went idle past its ping window
    #[error("Connection timeout after {duration}s")]
    Timeout { duration: u64 },

    /// Inbound message could not be classified
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Consumer side of the event queue was dropped
    #[error("Event queue closed by consumer")]
    QueueClosed,
}

impl DeribitError {
    /// Check if the error is retryable by reconnecting
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeribitError::Http(_)
                | DeribitError::Timeout { .. }
                | DeribitError::WebSocket(_)
                | DeribitError::Authentication { .. }
                | DeribitError::Api { .. }
                | DeribitError::Serialization(_)
                | DeribitError::InvalidResponse(_)
        )
    }

    /// Errors that end a session instead of triggering a reconnect
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DeribitError::Config(_) | DeribitError::UrlParse(_) | DeribitError::QueueClosed
        )
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        DeribitError::Api {
            code: i64::from(status.as_u16()),
            message: message.into(),
        }
    }

    pub(crate) fn websocket(err: impl std::fmt::Display) -> Self {
        DeribitError::WebSocket(err.to_string())
    }
}

/// Result type alias for Deribit operations
pub type Result<T> = std::result::Result<T, DeribitError>;
