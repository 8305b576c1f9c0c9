//! Resilient HTTP client for notification delivery.
//!
//! Sends a pre-built JSON body as a POST, retrying transient failures with
//! the configured [`RetryStrategy`]. Providers only contribute headers
//! through a callback; nothing here knows about any specific backend.

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::RequestBuilder;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::TransportConfig;
use crate::context::{DeliveryContext, Interruption};
use crate::error::{ConfigError, DeliveryError, NotifierResult};
use crate::observer::{AttemptRecord, DeliveryObserver, NoopObserver};
use crate::retry::{RetryStrategy, is_retryable_status};

/// Upper bound on a server supplied `Retry-After` hint.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Longest response body excerpt kept in errors.
const BODY_EXCERPT_LIMIT: usize = 512;

const USER_AGENT: &str = concat!("alertbridge/", env!("CARGO_PKG_VERSION"));

/// Successful delivery summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    /// 2xx status returned by the backend.
    pub status: u16,
    /// Number of requests issued, including the successful one.
    pub attempts: u32,
}

/// HTTP client with retry, proxy and custom trust store support.
///
/// Cloning is cheap and shares the underlying connection pool, so one
/// client can serve concurrent deliveries.
#[derive(Clone)]
pub struct ResilientClient {
    http: reqwest::Client,
    retry: Arc<dyn RetryStrategy>,
    observer: Arc<dyn DeliveryObserver>,
}

impl ResilientClient {
    /// Builds the client. Proxy and trust store are applied here, once.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the proxy URL or trust store is invalid or
    /// the transport cannot be built.
    pub fn new(
        transport: &TransportConfig,
        retry: Arc<dyn RetryStrategy>,
    ) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder()
            .timeout(transport.timeout)
            .user_agent(USER_AGENT);

        match transport.proxy_url.as_deref() {
            Some(proxy_url) => {
                let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| ConfigError::InvalidUrl {
                    field: "proxy_url",
                    reason: e.to_string(),
                })?;
                builder = builder.proxy(proxy);
            }
            // reqwest reads the proxy environment unless told otherwise.
            None if !transport.use_system_proxy => builder = builder.no_proxy(),
            None => {}
        }

        if let Some(trust_store) = &transport.trust_store {
            builder = builder.tls_built_in_root_certs(false);
            for cert in trust_store.certificates()? {
                builder = builder.add_root_certificate(cert);
            }
        }

        Ok(Self {
            http: builder.build()?,
            retry,
            observer: Arc::new(NoopObserver),
        })
    }

    /// Attaches an observer notified of every attempt.
    pub fn with_observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the attached observer.
    pub fn observer(&self) -> &dyn DeliveryObserver {
        self.observer.as_ref()
    }

    /// Returns the retry strategy.
    pub fn retry_strategy(&self) -> &dyn RetryStrategy {
        self.retry.as_ref()
    }

    /// POSTs `body` to `target` until it succeeds, fails terminally, runs
    /// out of attempts, or `ctx` ends.
    ///
    /// `decorate` receives the request headers (with `Content-Type` already
    /// set) and adds whatever the provider needs.
    ///
    /// # Errors
    ///
    /// - `Rejected` for a non-retryable status
    /// - `RetriesExhausted` when every attempt failed transiently
    /// - `Cancelled` / `DeadlineExceeded` when `ctx` ended first
    /// - `Request` when the request cannot be built
    pub async fn send<F>(
        &self,
        ctx: &DeliveryContext,
        delivery_id: Uuid,
        target: &str,
        body: Bytes,
        decorate: F,
    ) -> NotifierResult<SendReport>
    where
        F: FnOnce(&mut HeaderMap),
    {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        decorate(&mut headers);

        let mut attempt = 0;
        let mut last_status = None;

        loop {
            if let Some(interruption) = ctx.interruption() {
                return Err(interrupted(interruption, target, attempt, last_status));
            }

            attempt += 1;
            let started = Instant::now();
            let request = self
                .http
                .post(target)
                .headers(headers.clone())
                .body(body.clone());

            let result = tokio::select! {
                biased;
                interruption = ctx.done() => {
                    self.observer.on_attempt(&AttemptRecord {
                        delivery_id,
                        target: target.to_string(),
                        attempt,
                        status: None,
                        elapsed: started.elapsed(),
                        error: Some(interruption.to_string()),
                        will_retry: false,
                    });
                    tracing::debug!(attempt, "Delivery interrupted in flight");
                    return Err(interrupted(interruption, target, attempt, last_status));
                }
                result = execute(request) => result,
            };

            let failure = match result {
                Ok(status) => {
                    self.observer.on_attempt(&AttemptRecord {
                        delivery_id,
                        target: target.to_string(),
                        attempt,
                        status: Some(status),
                        elapsed: started.elapsed(),
                        error: None,
                        will_retry: false,
                    });
                    tracing::debug!(attempt, status, "Delivery attempt succeeded");
                    return Ok(SendReport { status, attempts: attempt });
                }
                Err(failure) => failure,
            };

            if failure.status.is_some() {
                last_status = failure.status;
            }

            let delay = if failure.retryable {
                self.retry.next_delay(attempt)
            } else {
                None
            };

            self.observer.on_attempt(&AttemptRecord {
                delivery_id,
                target: target.to_string(),
                attempt,
                status: failure.status,
                elapsed: started.elapsed(),
                error: Some(failure.message.clone()),
                will_retry: delay.is_some(),
            });

            let Some(delay) = delay else {
                tracing::warn!(
                    attempt,
                    status = ?failure.status,
                    retryable = failure.retryable,
                    error = %failure.message,
                    "Delivery failed"
                );
                return Err(failure.into_error(target, attempt, last_status));
            };

            let delay = match failure.retry_after {
                Some(hint) => delay.max(hint.min(MAX_RETRY_AFTER)),
                None => delay,
            };

            tracing::warn!(
                attempt,
                status = ?failure.status,
                delay_ms = delay.as_millis() as u64,
                error = %failure.message,
                "Delivery attempt failed, retrying"
            );

            tokio::select! {
                biased;
                interruption = ctx.done() => {
                    tracing::debug!(attempt, "Delivery interrupted during backoff");
                    return Err(interrupted(interruption, target, attempt, last_status));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// A failed attempt, classified for the retry decision.
#[derive(Debug)]
struct AttemptFailure {
    status: Option<u16>,
    body: String,
    message: String,
    retryable: bool,
    retry_after: Option<Duration>,
}

impl AttemptFailure {
    fn from_status(status: u16, body: String, retry_after: Option<Duration>) -> Self {
        Self {
            status: Some(status),
            message: format!("HTTP {status}: {body}"),
            body,
            retryable: is_retryable_status(status),
            retry_after,
        }
    }

    fn from_transport(err: reqwest::Error) -> Self {
        // Builder and redirect errors repeat identically on every attempt.
        let retryable = !(err.is_builder() || err.is_redirect());
        Self {
            status: None,
            body: String::new(),
            message: error_chain(&err),
            retryable,
            retry_after: None,
        }
    }

    fn into_error(self, target: &str, attempts: u32, last_status: Option<u16>) -> DeliveryError {
        match (self.retryable, self.status) {
            (true, _) => DeliveryError::RetriesExhausted {
                target: target.to_string(),
                attempts,
                last_status,
                cause: self.message,
            },
            (false, Some(status)) => DeliveryError::Rejected {
                target: target.to_string(),
                status,
                body: self.body,
                attempts,
            },
            (false, None) => DeliveryError::Request {
                target: target.to_string(),
                message: self.message,
                attempts,
                last_status,
            },
        }
    }
}

async fn execute(request: RequestBuilder) -> Result<u16, AttemptFailure> {
    let response = request.send().await.map_err(AttemptFailure::from_transport)?;
    let status = response.status();
    if status.is_success() {
        return Ok(status.as_u16());
    }

    let retry_after = parse_retry_after(response.headers());
    let body = match response.text().await {
        Ok(text) => excerpt(&text),
        Err(e) => format!("<unreadable body: {e}>"),
    };
    Err(AttemptFailure::from_status(status.as_u16(), body, retry_after))
}

fn interrupted(
    interruption: Interruption,
    target: &str,
    attempts: u32,
    last_status: Option<u16>,
) -> DeliveryError {
    let target = target.to_string();
    match interruption {
        Interruption::Cancelled => DeliveryError::Cancelled {
            target,
            attempts,
            last_status,
        },
        Interruption::DeadlineExceeded => DeliveryError::DeadlineExceeded {
            target,
            attempts,
            last_status,
        },
    }
}

/// Parses a delay-seconds `Retry-After` header. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn excerpt(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= BODY_EXCERPT_LIMIT {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(BODY_EXCERPT_LIMIT).collect();
        cut.push_str("...");
        cut
    }
}

/// Flattens an error and its sources; reqwest hides TLS and connect
/// details in the source chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
