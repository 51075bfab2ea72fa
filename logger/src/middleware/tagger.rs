use chrono::Utc;
use client::RequestInterceptor;
use common::{
    error::{AppError, Res},
    exchange::RequestConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Metadata key the tag is stored under.
pub const NAMESPACE: &str = "http-audit-logger";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeTag {
    /// Unix millis at which the request was handed to the client.
    pub request_timestamp: i64,
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Stores `{requestTimestamp: now}` under [`NAMESPACE`].
///
/// Fields already present under the key win over the fresh ones.
pub fn tag_request(mut config: RequestConfig, now: i64) -> RequestConfig {
    let mut tag = Map::new();
    tag.insert("requestTimestamp".to_string(), json!(now));

    if let Some(Value::Object(existing)) = config.metadata.get(NAMESPACE) {
        for (key, value) in existing {
            tag.insert(key.clone(), value.clone());
        }
    }

    config
        .metadata
        .insert(NAMESPACE.to_string(), Value::Object(tag));
    config
}

pub fn read_tag(config: &RequestConfig) -> Res<ExchangeTag> {
    config
        .metadata
        .get(NAMESPACE)
        .and_then(|tag| ExchangeTag::deserialize(tag).ok())
        .ok_or_else(|| AppError::MissingTag(NAMESPACE.to_string()))
}

pub struct RequestTagger;

impl RequestInterceptor for RequestTagger {
    fn on_request(&self, config: RequestConfig) -> Res<RequestConfig> {
        Ok(tag_request(config, now_millis()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_readable() {
        let config = tag_request(RequestConfig::get("http://example.com"), 1_000);
        assert_eq!(
            read_tag(&config).unwrap(),
            ExchangeTag {
                request_timestamp: 1_000
            }
        );
    }

    #[test]
    fn retagging_keeps_existing_timestamp() {
        let config = tag_request(RequestConfig::get("http://example.com"), 1_000);
        let config = tag_request(config, 5_000);
        assert_eq!(read_tag(&config).unwrap().request_timestamp, 1_000);
    }

    #[test]
    fn existing_fields_under_namespace_survive() {
        let mut config = RequestConfig::get("http://example.com");
        config
            .metadata
            .insert(NAMESPACE.to_string(), json!({ "traceId": "abc" }));

        let config = tag_request(config, 42);
        assert_eq!(
            config.metadata.get(NAMESPACE),
            Some(&json!({ "traceId": "abc", "requestTimestamp": 42 }))
        );
    }

    #[test]
    fn other_namespaces_are_untouched() {
        let mut config = RequestConfig::get("http://example.com");
        config.metadata.insert("other".to_string(), json!(1));

        let config = RequestTagger.on_request(config).unwrap();
        assert_eq!(config.metadata.get("other"), Some(&json!(1)));
        assert!(read_tag(&config).unwrap().request_timestamp > 0);
    }

    #[test]
    fn untagged_request_is_an_error() {
        let config = RequestConfig::get("http://example.com");
        assert!(matches!(read_tag(&config), Err(AppError::MissingTag(_))));
    }
}
