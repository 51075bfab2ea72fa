use std::{fmt, sync::Arc, time::Duration};

use common::{
    error::{AppError, Res},
    exchange::{ExchangeError, Headers, RawResponse, RequestConfig, SentRequest},
};
use serde_json::Value;
use url::Url;

use crate::interceptor::Interceptors;

/// Applied to every client derived through [`HttpClient::create`].
pub type DeriveHook = Arc<dyn Fn(HttpClient) -> HttpClient + Send + Sync>;

#[derive(Clone, Debug, Default)]
pub struct ClientDefaults {
    /// Headers added to every request that does not set them itself.
    pub headers: Headers,
    pub timeout: Option<Duration>,
}

/// HTTP client with request and response interceptor chains.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    defaults: ClientDefaults,
    interceptors: Interceptors,
    derive_hooks: Vec<DeriveHook>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("defaults", &self.defaults)
            .field("request_interceptors", &self.interceptors.request_len())
            .field("response_interceptors", &self.interceptors.response_len())
            .field("derive_hooks", &self.derive_hooks.len())
            .finish()
    }
}

impl HttpClient {
    pub fn new() -> Res<Self> {
        Self::with_defaults(ClientDefaults::default())
    }

    pub fn with_defaults(defaults: ClientDefaults) -> Res<Self> {
        let inner = reqwest::Client::builder().build()?;
        Ok(Self::from_parts(inner, defaults))
    }

    fn from_parts(inner: reqwest::Client, defaults: ClientDefaults) -> Self {
        HttpClient {
            inner,
            defaults,
            interceptors: Interceptors::default(),
            derive_hooks: Vec::new(),
        }
    }

    pub fn defaults(&self) -> &ClientDefaults {
        &self.defaults
    }

    pub fn interceptors(&self) -> &Interceptors {
        &self.interceptors
    }

    pub fn interceptors_mut(&mut self) -> &mut Interceptors {
        &mut self.interceptors
    }

    /// Registers a hook run on every client this one derives.
    pub fn on_derive(&mut self, hook: DeriveHook) {
        self.derive_hooks.push(hook);
    }

    /// Derives a new client with its own defaults and an empty
    /// interceptor chain, then hands it to each derive hook in turn.
    ///
    /// The derived client shares this client's connection pool.
    pub fn create(&self, defaults: ClientDefaults) -> HttpClient {
        let instance = Self::from_parts(self.inner.clone(), defaults);
        self.derive_hooks
            .iter()
            .fold(instance, |instance, hook| hook(instance))
    }

    pub async fn get(&self, url: impl Into<String>) -> Res<RawResponse> {
        self.request(RequestConfig::get(url)).await
    }

    pub async fn post(&self, url: impl Into<String>, data: impl Into<String>) -> Res<RawResponse> {
        self.request(RequestConfig::post(url).body(data)).await
    }

    /// Sends `config` through the request interceptors, the network and the
    /// response interceptors.
    ///
    /// Responses outside 2xx come back as [`AppError::Exchange`] with the
    /// response attached.
    pub async fn request(&self, config: RequestConfig) -> Res<RawResponse> {
        let config = self.interceptors.run_request(self.merge_defaults(config))?;
        let result = self.dispatch(config).await;
        self.interceptors.run_response(result)
    }

    fn merge_defaults(&self, mut config: RequestConfig) -> RequestConfig {
        for (name, value) in &self.defaults.headers {
            if config.header_value(name).is_none() {
                config.headers.insert(name.clone(), value.clone());
            }
        }
        config
    }

    async fn dispatch(&self, config: RequestConfig) -> Res<RawResponse> {
        let url = dispatch_url(&config)?;
        let method = reqwest::Method::from_bytes(config.method.to_uppercase().as_bytes())
            .map_err(|e| AppError::Internal(format!("Invalid method '{}': {}", config.method, e)))?;

        let sent = SentRequest {
            method: Some(method.as_str().to_string()),
            path: Some(request_target(&url)),
        };

        let mut builder = self.inner.request(method, url);
        for (name, value) in &config.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(data) = &config.data {
            builder = builder.body(data.clone());
        }
        if let Some(timeout) = self.defaults.timeout {
            builder = builder.timeout(timeout);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                log::debug!("{} {} failed: {}", config.method, config.url, e);
                return Err(ExchangeError {
                    message: e.to_string(),
                    config,
                    request: Some(sent),
                    response: None,
                }
                .into());
            }
        };

        let status = response.status();
        let headers = collect_headers(response.headers());
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                return Err(ExchangeError {
                    message: e.to_string(),
                    config,
                    request: Some(sent),
                    response: None,
                }
                .into());
            }
        };

        let raw = RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().map(str::to_string),
            headers,
            data: decode_body(&body),
            config,
            request: sent,
        };

        if status.is_success() {
            Ok(raw)
        } else {
            Err(ExchangeError {
                message: format!("Request failed with status code {}", raw.status),
                config: raw.config.clone(),
                request: Some(raw.request.clone()),
                response: Some(raw),
            }
            .into())
        }
    }
}

/// Target URL with the explicit params appended to its query string.
fn dispatch_url(config: &RequestConfig) -> Res<Url> {
    let mut url = Url::parse(&config.url)?;
    if config.params.is_empty() {
        return Ok(url);
    }

    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &config.params {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    for item in items {
                        pairs.append_pair(key, &param_text(item));
                    }
                }
                other => {
                    pairs.append_pair(key, &param_text(other));
                }
            }
        }
    }
    Ok(url)
}

fn param_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Path plus query, as written on the request line.
fn request_target(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> Headers {
    let mut collected = Headers::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match collected.get_mut(name.as_str()) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => {
                collected.insert(name.as_str().to_string(), value);
            }
        }
    }
    collected
}

/// JSON when the body parses, text otherwise, nothing when empty.
fn decode_body(body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    Some(
        serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned())),
    )
}
