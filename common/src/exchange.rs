use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::Res;

/// Header names to values. Multi-valued headers are joined with `", "`.
pub type Headers = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Default)]
/// An outgoing request as configured by the caller, before dispatch.
///
/// `metadata` is a free-form JSON object that travels with the request
/// through the interceptor chains and ends up on the response or error.
/// Interceptors store their per-exchange data there under their own key.
pub struct RequestConfig {
    /// Lower-cased HTTP method.
    pub method: String,
    /// Absolute target URL, possibly with a query string.
    pub url: String,
    /// Headers as configured, names in the caller's casing.
    pub headers: Headers,
    /// Explicit query parameters, appended to the URL at dispatch.
    pub params: Map<String, Value>,
    /// Raw request body.
    pub data: Option<String>,
    /// Per-exchange data keyed by interceptor namespace.
    pub metadata: Map<String, Value>,
}

impl RequestConfig {
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        RequestConfig {
            method: method.to_lowercase(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("get", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("post", url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new("put", url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new("delete", url)
    }

    /// Sets a header. A name already set in another case is replaced, so
    /// the last call wins.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers
            .retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Serializes `body` as the request data and defaults the content type
    /// to `application/json` when none is configured.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Res<Self> {
        self.data = Some(serde_json::to_string(body)?);
        if self.header_value("content-type").is_none() {
            self.headers
                .insert("Content-Type".to_string(), "application/json".to_string());
        }
        Ok(self)
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
/// What the transport actually put on the wire.
pub struct SentRequest {
    /// Upper-case method of the dispatched request.
    pub method: Option<String>,
    /// Request target: path plus query string.
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
/// A received response together with the request that produced it.
pub struct RawResponse {
    pub status: u16,
    pub status_text: Option<String>,
    /// Response headers, names lower-cased.
    pub headers: Headers,
    /// Decoded body: JSON when it parses, a string otherwise.
    pub data: Option<Value>,
    pub config: RequestConfig,
    pub request: SentRequest,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
/// A failed exchange.
///
/// `response` is present when the server answered but the status was
/// rejected, and absent when no response arrived at all.
pub struct ExchangeError {
    pub message: String,
    pub config: RequestConfig,
    pub request: Option<SentRequest>,
    pub response: Option<RawResponse>,
}
