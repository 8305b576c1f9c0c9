//! Notifier configuration.

use alertbridge_events::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::ExponentialBackoff;

/// Default per-attempt request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration shared by all notifier providers.
///
/// Read once when a notifier is constructed; nothing here is re-resolved
/// per delivery.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Provider secret (access token, HMAC key, ...).
    pub credential: String,
    /// Environment label reported to the provider.
    pub environment: String,
    /// Endpoint override. Empty means the provider default.
    pub target_url: String,
    /// Optional proxy all requests are routed through.
    pub proxy_url: Option<String>,
    /// Honor `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` when no proxy URL is set.
    pub use_system_proxy: bool,
    /// Optional custom CA bundle replacing the built-in roots.
    pub trust_store: Option<TrustStore>,
    /// Events below this severity are skipped.
    pub min_severity: Severity,
    /// Retry schedule.
    pub retry: ExponentialBackoff,
    /// Per-attempt request timeout.
    #[serde(with = "duration_ms", rename = "timeout_ms")]
    pub timeout: Duration,
    /// Extra static headers attached to every request.
    pub headers: BTreeMap<String, String>,
}

impl NotifierConfig {
    /// Creates a configuration with the given credential and defaults for
    /// everything else.
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            ..Self::default()
        }
    }

    /// Sets the environment label.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Sets the endpoint override.
    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = url.into();
        self
    }

    /// Routes requests through a proxy.
    pub fn with_proxy_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }

    /// Falls back to the proxy environment variables.
    pub fn with_system_proxy(mut self, enabled: bool) -> Self {
        self.use_system_proxy = enabled;
        self
    }

    /// Trusts only the certificates in `trust_store`.
    pub fn with_trust_store(mut self, trust_store: TrustStore) -> Self {
        self.trust_store = Some(trust_store);
        self
    }

    /// Sets the severity threshold.
    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    /// Sets the retry schedule.
    pub fn with_retry(mut self, retry: ExponentialBackoff) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a static request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Returns the endpoint, falling back to `default_url` when blank.
    pub fn resolve_target_url(&self, default_url: &str) -> String {
        let url = self.target_url.trim();
        if url.is_empty() {
            default_url.to_string()
        } else {
            url.to_string()
        }
    }

    /// Transport settings for the resilient client.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            proxy_url: self.proxy_url.clone().filter(|url| !url.trim().is_empty()),
            use_system_proxy: self.use_system_proxy,
            trust_store: self.trust_store.clone(),
            timeout: self.timeout,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            credential: String::new(),
            environment: String::new(),
            target_url: String::new(),
            proxy_url: None,
            use_system_proxy: false,
            trust_store: None,
            min_severity: Severity::Error,
            retry: ExponentialBackoff::default(),
            timeout: DEFAULT_TIMEOUT,
            headers: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("credential", &"<redacted>")
            .field("environment", &self.environment)
            .field("target_url", &self.target_url)
            .field("proxy_url", &self.proxy_url.as_ref().map(|_| "<set>"))
            .field("use_system_proxy", &self.use_system_proxy)
            .field("trust_store", &self.trust_store)
            .field("min_severity", &self.min_severity)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Settings applied once when the HTTP transport is built.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Optional proxy URL.
    pub proxy_url: Option<String>,
    /// Use environment proxy settings when `proxy_url` is unset.
    pub use_system_proxy: bool,
    /// Optional custom CA bundle.
    pub trust_store: Option<TrustStore>,
    /// Per-attempt request timeout.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            use_system_proxy: false,
            trust_store: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// A PEM encoded certificate bundle.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustStore {
    pem: String,
}

impl TrustStore {
    /// Wraps PEM text holding one or more certificates.
    pub fn from_pem(pem: impl Into<String>) -> Self {
        Self { pem: pem.into() }
    }

    /// Reads a PEM bundle from disk.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        std::fs::read_to_string(path)
            .map(Self::from_pem)
            .map_err(|e| ConfigError::InvalidTrustStore(format!("{}: {e}", path.display())))
    }

    /// Parses the bundle into certificates.
    pub fn certificates(&self) -> Result<Vec<reqwest::Certificate>, ConfigError> {
        let certs = reqwest::Certificate::from_pem_bundle(self.pem.as_bytes())
            .map_err(|e| ConfigError::InvalidTrustStore(e.to_string()))?;
        if certs.is_empty() {
            return Err(ConfigError::InvalidTrustStore(
                "bundle contains no certificates".to_string(),
            ));
        }
        Ok(certs)
    }
}

impl fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustStore")
            .field("pem_bytes", &self.pem.len())
            .finish()
    }
}

/// Serde helper storing a `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
