use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Logical request descriptor a provider can execute.
///
/// Parameters are kept in a `BTreeMap` so fingerprint derivation is
/// deterministic regardless of insertion order. Every parameter that
/// affects the upstream response must be included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    endpoint: String,
    params: BTreeMap<String, String>,
}

impl QuerySpec {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// URL-encoded `key=value&...` form of the parameters, in sorted
    /// key order.
    pub fn query_string(&self) -> String {
        self.params
            .iter()
            .map(|(key, value)| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Derives the cache key for this request as issued by `provider`.
    pub fn fingerprint(&self, provider: &str) -> Fingerprint {
        let mut key = String::with_capacity(64);
        key.push_str(provider);
        key.push(':');
        key.push_str(&self.endpoint);
        for (name, value) in &self.params {
            key.push('&');
            key.push_str(name);
            key.push('=');
            key.push_str(value);
        }
        Fingerprint(key)
    }
}

/// Deterministic cache key derived from a provider name plus the
/// logical request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
