//! Rollbar notifier.
//!
//! Error events are reported as Rollbar "message" items. The involved
//! object is encoded as the server host (`kind/name.namespace`) so Rollbar
//! groups occurrences per object.

use alertbridge_events::{Event, ObjectReference};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::client::ResilientClient;
use crate::config::NotifierConfig;
use crate::context::DeliveryContext;
use crate::error::{ConfigError, NotifierResult};
use crate::filter::SeverityFilter;
use crate::notifier::{DeliveryOutcome, Notifier};
use crate::observer::DeliveryObserver;
use crate::providers::{static_headers, validate_target_url};

/// Provider name.
pub const PROVIDER: &str = "rollbar";

/// Item endpoint used when no target URL is configured.
pub const DEFAULT_URL: &str = "https://api.rollbar.com/api/1/item/";

/// Header carrying the project access token.
pub const ACCESS_TOKEN_HEADER: &str = "x-rollbar-access-token";

/// Reported item level. Only errors pass the default filter.
pub const LEVEL: &str = "error";

/// Reported platform.
pub const PLATFORM: &str = "linux";

/// Rollbar item payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbarPayload {
    /// Project access token.
    pub access_token: String,
    /// Item data.
    pub data: RollbarData,
}

/// Rollbar item data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbarData {
    /// Environment label.
    pub environment: String,
    /// Item body.
    pub body: RollbarBody,
    /// Item level.
    pub level: String,
    /// Unix seconds at which the payload was built.
    pub timestamp: i64,
    /// Reporting platform.
    pub platform: String,
    /// Server block identifying the involved object.
    pub server: RollbarServer,
}

/// Rollbar item body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbarBody {
    /// Message item.
    pub message: RollbarMessage,
}

/// Rollbar message item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbarMessage {
    /// Message text.
    pub body: String,
}

/// Rollbar server block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbarServer {
    /// `kind/name.namespace` of the involved object.
    pub host: String,
}

impl RollbarPayload {
    /// Builds the payload for `event`, stamped with the current time.
    ///
    /// The timestamp is the build time, not `event.timestamp`: Rollbar
    /// orders occurrences by when they were reported.
    pub fn build(config: &NotifierConfig, event: &Event) -> Self {
        Self::build_at(config, event, Utc::now())
    }

    /// Builds the payload for `event` with an explicit timestamp.
    pub fn build_at(config: &NotifierConfig, event: &Event, now: DateTime<Utc>) -> Self {
        Self {
            access_token: config.credential.clone(),
            data: RollbarData {
                environment: config.environment.clone(),
                body: RollbarBody {
                    message: RollbarMessage {
                        body: event.message.clone(),
                    },
                },
                level: LEVEL.to_string(),
                timestamp: now.timestamp(),
                platform: PLATFORM.to_string(),
                server: RollbarServer {
                    host: server_host(&event.involved_object),
                },
            },
        }
    }
}

/// Returns `lowercase(kind)/name.namespace`.
pub fn server_host(object: &ObjectReference) -> String {
    format!(
        "{}/{}.{}",
        object.kind.to_lowercase(),
        object.name,
        object.namespace
    )
}

/// Notifier posting error events to Rollbar.
pub struct Rollbar {
    config: NotifierConfig,
    url: String,
    filter: SeverityFilter,
    headers: HeaderMap,
    client: ResilientClient,
}

impl Rollbar {
    /// Creates a Rollbar notifier.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingCredential` if the access token is
    /// empty, or another `ConfigError` if the URL, proxy, trust store or
    /// static headers are invalid. Any non-empty token is accepted: it is
    /// always sent in the body, and also as `x-rollbar-access-token` when it
    /// is a valid header value.
    pub fn new(config: NotifierConfig) -> Result<Self, ConfigError> {
        if config.credential.is_empty() {
            return Err(ConfigError::MissingCredential { provider: PROVIDER });
        }

        let url = config.resolve_target_url(DEFAULT_URL);
        validate_target_url(&url)?;

        let mut headers = static_headers(&config.headers)?;
        match HeaderValue::from_str(&config.credential) {
            Ok(mut token) => {
                token.set_sensitive(true);
                headers.insert(HeaderName::from_static(ACCESS_TOKEN_HEADER), token);
            }
            Err(_) => tracing::warn!(
                "Rollbar token is not a valid header value, sending it in the body only"
            ),
        }

        let client = ResilientClient::new(&config.transport(), Arc::new(config.retry.clone()))?;

        Ok(Self {
            filter: SeverityFilter::new(config.min_severity),
            config,
            url,
            headers,
            client,
        })
    }

    /// Attaches a delivery observer.
    pub fn with_observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.client = self.client.with_observer(observer);
        self
    }

    /// Returns the access token.
    pub fn token(&self) -> &str {
        &self.config.credential
    }

    /// Returns the environment label.
    pub fn environment(&self) -> &str {
        &self.config.environment
    }

    /// Returns the resolved endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the severity filter.
    pub fn filter(&self) -> SeverityFilter {
        self.filter
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

        let payload = RollbarPayload::build(&self.config, event);
        let body = Bytes::from(serde_json::to_vec(&payload)?);

        let report = self
            .client
            .send(ctx, delivery_id, &self.url, body, |headers| {
                headers.extend(self.headers.clone());
            })
            .await?;

        tracing::info!(
            status = report.status,
            attempts = report.attempts,
            "Notification delivered"
        );

        Ok(DeliveryOutcome::Delivered {
            status: report.status,
            attempts: report.attempts,
        })
    }
}

#[async_trait]
impl Notifier for Rollbar {
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
            object = %server_host(&event.involved_object),
        );

        let result = self.deliver(ctx, delivery_id, event).instrument(span).await;
        self.client.observer().on_outcome(PROVIDER, &result);
        result
    }
}

impl std::fmt::Debug for Rollbar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rollbar")
            .field("environment", &self.config.environment)
            .field("url", &self.url)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}
