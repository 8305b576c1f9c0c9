//! Notifier implementations.
//!
//! [`Rollbar`] is the reference provider. [`Forwarder`] is an optional
//! extra for relaying raw events to an in-house receiver.

pub mod forwarder;
pub mod rollbar;

pub use forwarder::Forwarder;
pub use rollbar::Rollbar;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;

use crate::error::ConfigError;

/// Checks that `url` is an absolute http(s) URL.
pub(crate) fn validate_target_url(url: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        field: "target_url",
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidUrl {
            field: "target_url",
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

/// Converts configured static headers into a header map.
pub(crate) fn static_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ConfigError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}
