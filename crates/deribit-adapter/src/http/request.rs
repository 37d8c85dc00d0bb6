/*
[INPUT]:  HTTP method, endpoint path, query/body parameters
[OUTPUT]: Transport-agnostic REST request value that auth can decorate
[POS]:    HTTP layer - request description shared by signer and client
[UPDATE]: When adding request fields or changing read/write classification
*/

use std::collections::BTreeMap;

use reqwest::Method;
use serde_json::{Map, Value};

use crate::auth::signer::AUTHORIZATION_HEADER;

/// A unary REST request before it is turned into a `reqwest::RequestBuilder`
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: Method,
    pub path: String,
    pub query: Map<String, Value>,
    pub body: Option<Map<String, Value>>,
    pub headers: BTreeMap<String, String>,
    pub is_auth_required: bool,
}

impl RestRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Map::new(),
            body: None,
            headers: BTreeMap::new(),
            is_auth_required: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn auth_required(mut self) -> Self {
        self.is_auth_required = true;
        self
    }

    /// Write methods carry their parameters in the body, reads in the query string
    pub fn is_write(&self) -> bool {
        matches!(
            self.method,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE
        )
    }

    /// Whether an Authorization header is present, in any letter case
    pub fn has_authorization(&self) -> bool {
        self.headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case(AUTHORIZATION_HEADER))
    }

    /// Query parameters rendered as plain strings (no JSON quoting)
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }
}
