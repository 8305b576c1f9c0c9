//! Optional webhook forwarder.
//!
//! Posts the event itself as JSON to a caller-chosen endpoint, for setups
//! that relay events to their own receiver instead of an alerting service.
//! When a credential is configured it is used as an HMAC key and the body
//! signature is sent in `X-Signature`.

use alertbridge_events::Event;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::client::ResilientClient;
use crate::config::NotifierConfig;
use crate::context::DeliveryContext;
use crate::error::{ConfigError, DeliveryError, NotifierResult};
use crate::filter::SeverityFilter;
use crate::notifier::{DeliveryOutcome, Notifier};
use crate::observer::DeliveryObserver;
use crate::providers::{static_headers, validate_target_url};
use crate::signature::{PayloadSigner, SIGNATURE_HEADER};

/// Provider name.
pub const PROVIDER: &str = "forwarder";

/// Optional notifier forwarding raw events to a webhook.
pub struct Forwarder {
    url: String,
    filter: SeverityFilter,
    signer: Option<PayloadSigner>,
    headers: HeaderMap,
    client: ResilientClient,
}

impl Forwarder {
    /// Creates a forwarder.
    ///
    /// The credential is optional; the target URL is not, since there is
    /// no default endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingTargetUrl` if no URL is configured, or
    /// another `ConfigError` if the URL, proxy, trust store or headers are
    /// invalid.
    pub fn new(config: NotifierConfig) -> Result<Self, ConfigError> {
        let url = config.target_url.trim().to_string();
        if url.is_empty() {
            return Err(ConfigError::MissingTargetUrl { provider: PROVIDER });
        }
        validate_target_url(&url)?;

        let headers = static_headers(&config.headers)?;
        let signer = (!config.credential.is_empty()).then(|| PayloadSigner::new(&config.credential));
        let client = ResilientClient::new(&config.transport(), Arc::new(config.retry.clone()))?;

        Ok(Self {
            url,
            filter: SeverityFilter::new(config.min_severity),
            signer,
            headers,
            client,
        })
    }

    /// Attaches a delivery observer.
    pub fn with_observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.client = self.client.with_observer(observer);
        self
    }

    /// Returns the endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns true if bodies are signed.
    pub fn is_signing(&self) -> bool {
        self.signer.is_some()
    }

    async fn deliver(
        &self,
        ctx: &DeliveryContext,
        delivery_id: Uuid,
        event: &Event,
    ) -> NotifierResult<DeliveryOutcome> {
        if !self.filter.allows(event) {
            tracing::debug!(
                severity = %event.severity,
                threshold = %self.filter.threshold(),
                "Event below severity threshold, skipping"
            );
            return Ok(DeliveryOutcome::Skipped);
        }

        let body = serde_json::to_vec(event)?;
        let signature = match &self.signer {
            Some(signer) => Some(HeaderValue::from_str(&signer.sign(&body)).map_err(|e| {
                DeliveryError::Request {
                    target: self.url.clone(),
                    message: format!("invalid signature header: {e}"),
                    attempts: 0,
                    last_status: None,
                }
            })?),
            None => None,
        };

        let report = self
            .client
            .send(ctx, delivery_id, &self.url, Bytes::from(body), |headers| {
                headers.extend(self.headers.clone());
                if let Some(signature) = signature {
                    headers.insert(HeaderName::from_static(SIGNATURE_HEADER), signature);
                }
            })
            .await?;

        tracing::info!(
            status = report.status,
            attempts = report.attempts,
            signed = self.signer.is_some(),
            "Event forwarded"
        );

        Ok(DeliveryOutcome::Delivered {
            status: report.status,
            attempts: report.attempts,
        })
    }
}

#[async_trait]
impl Notifier for Forwarder {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn post(&self, ctx: &DeliveryContext, event: &Event) -> NotifierResult<DeliveryOutcome> {
        let delivery_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "notifier_post",
            provider = PROVIDER,
            %delivery_id,
            endpoint = %self.url,
            kind = %event.involved_object.kind,
            name = %event.involved_object.name,
            namespace = %event.involved_object.namespace,
        );

        let result = self.deliver(ctx, delivery_id, event).instrument(span).await;
        self.client.observer().on_outcome(PROVIDER, &result);
        result
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("url", &self.url)
            .field("filter", &self.filter)
            .field("signing", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}
