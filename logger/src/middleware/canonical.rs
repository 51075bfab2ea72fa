//! Client-independent view of both sides of an exchange.

use common::{
    error::{AppError, Res},
    exchange::{Headers, RawResponse, RequestConfig, SentRequest},
};
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use crate::options::{BodyContext, BodyTransform};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRequest {
    pub method: String,
    pub path: String,
    /// Lower-cased header names, `host` always present.
    pub headers: Headers,
    pub query: Map<String, Value>,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalResponse {
    pub status: u16,
    pub status_text: Option<String>,
    pub headers: Headers,
    pub body: Value,
}

pub fn create_canonical_request(
    config: &RequestConfig,
    request: Option<&SentRequest>,
    transform: Option<&BodyTransform>,
) -> Res<CanonicalRequest> {
    let url = Url::parse(&config.url)?;

    let mut headers = Headers::new();
    headers.insert("host".to_string(), authority(&url));
    for (name, value) in &config.headers {
        headers.insert(name.to_lowercase(), value.clone());
    }

    let is_json = headers
        .get("content-type")
        .is_some_and(|content_type| content_type.starts_with("application/json"));

    let body = if is_json {
        config
            .data
            .as_deref()
            .and_then(|data| serde_json::from_str(data).ok())
            .unwrap_or(Value::Null)
    } else {
        match config.data.as_deref() {
            Some(data) if !data.is_empty() => Value::String(data.to_string()),
            _ => Value::Null,
        }
    };

    let body = apply_transform(body, transform, BodyContext::Request { request, config })?;

    let mut query = parse_query(&url);
    for (key, value) in &config.params {
        query.insert(key.clone(), value.clone());
    }

    Ok(CanonicalRequest {
        method: request
            .and_then(|request| request.method.clone())
            .unwrap_or_else(|| config.method.to_uppercase()),
        path: request
            .and_then(|request| request.path.clone())
            .unwrap_or_else(|| url.path().to_string()),
        headers,
        query,
        body,
    })
}

/// `None` when no response was received at all.
pub fn create_canonical_response(
    response: Option<&RawResponse>,
    transform: Option<&BodyTransform>,
) -> Res<Option<CanonicalResponse>> {
    let Some(response) = response else {
        return Ok(None);
    };

    let body = response.data.clone().unwrap_or(Value::Null);
    let body = apply_transform(
        body,
        transform,
        BodyContext::Response {
            response,
            config: &response.config,
        },
    )?;

    Ok(Some(CanonicalResponse {
        status: response.status,
        status_text: response.status_text.clone(),
        headers: response.headers.clone(),
        body,
    }))
}

fn apply_transform(
    body: Value,
    transform: Option<&BodyTransform>,
    context: BodyContext<'_>,
) -> Res<Value> {
    match transform {
        Some(transform) if !body.is_null() => transform(body, context).map_err(AppError::Transform),
        _ => Ok(body),
    }
}

/// Host plus port when the port is not the scheme default.
fn authority(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

/// Repeated keys collect into an array.
fn parse_query(url: &Url) -> Map<String, Value> {
    let mut query = Map::new();
    for (key, value) in url.query_pairs() {
        let value = Value::String(value.into_owned());
        match query.get_mut(&*key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                query.insert(key.into_owned(), value);
            }
        }
    }
    query
}
