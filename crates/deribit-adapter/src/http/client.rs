/*
[INPUT]:  HTTP configuration (base URL, timeouts) and RestRequest values
[OUTPUT]: JSON-RPC `result` payloads or typed API errors
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing response unwrapping
*/

use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::auth::DeribitAuth;
use crate::http::{DeribitError, RestRequest, Result};
use crate::types::Domain;

const SERVER_TIME_PATH: &str = "/public/get_time";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Main HTTP client for the Deribit v2 API
#[derive(Debug, Clone)]
pub struct DeribitClient {
    http_client: Client,
    base_url: Url,
}

impl DeribitClient {
    /// Create a new client for a domain with default configuration
    pub fn new(domain: Domain) -> Result<Self> {
        Self::with_config(domain, ClientConfig::default())
    }

    /// Create a new client for a domain with custom configuration
    pub fn with_config(domain: Domain, config: ClientConfig) -> Result<Self> {
        Self::with_config_and_base_url(config, domain.rest_url())
    }

    /// Create a client against an explicit base URL (mock servers, proxies)
    pub fn with_config_and_base_url(config: ClientConfig, base_url: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build full URL for an endpoint, keeping the base path (`/api/v2`)
    fn url(&self, endpoint: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let endpoint = endpoint.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{endpoint}"))?)
    }

    fn build(&self, request: &RestRequest) -> Result<RequestBuilder> {
        let url = self.url(&request.path)?;
        let mut builder = self.http_client.request(request.method.clone(), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query_pairs());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        Ok(builder)
    }

    /// Send a request as-is. Auth-required requests must already carry an
    /// Authorization header (see [`DeribitAuth::sign_unary`]).
    pub async fn send(&self, request: RestRequest) -> Result<Value> {
        if request.is_auth_required && !request.has_authorization() {
            return Err(DeribitError::Authentication {
                message: format!("{} {} requires a signed request", request.method, request.path),
            });
        }
        debug!(method = %request.method, path = %request.path, "rest request");
        let builder = self.build(&request)?;
        self.send_json(builder).await
    }

    /// Decorate a request with credentials, then send it
    pub async fn send_signed(&self, auth: &DeribitAuth, request: RestRequest) -> Result<Value> {
        let request = auth.sign_unary(request.auth_required())?;
        self.send(request).await
    }

    /// Query server time in milliseconds
    ///
    /// GET /public/get_time
    pub async fn server_time(&self) -> Result<i64> {
        let result = self.send(RestRequest::get(SERVER_TIME_PATH)).await?;
        result.as_i64().ok_or_else(|| {
            DeribitError::InvalidResponse(format!("get_time result is not an integer: {result}"))
        })
    }

    async fn send_json(&self, builder: RequestBuilder) -> Result<Value> {
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(err) if status.is_success() => return Err(err.into()),
            Err(_) => return Err(DeribitError::api_error(status, text)),
        };

        if let Some(error) = body.get("error") {
            return Err(rpc_error(error));
        }
        if !status.is_success() {
            return Err(DeribitError::api_error(status, text));
        }

        match body {
            Value::Object(mut map) => Ok(map.remove("result").unwrap_or(Value::Object(map))),
            other => Ok(other),
        }
    }
}

fn rpc_error(error: &Value) -> DeribitError {
    DeribitError::Api {
        code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
        message: error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string(),
    }
}
