//! # AlertBridge Notifier
//!
//! Resilient delivery of operational events to alerting backends:
//! - A `Notifier` trait with one implementation per provider
//! - Severity filtering before any payload is built
//! - Retry with exponential backoff, proxy and custom CA support
//! - Per-call cancellation and deadlines
//!
//! ## Example
//!
//! ```rust,ignore
//! use alertbridge_events::{Event, ObjectReference, Severity};
//! use alertbridge_notifier::{DeliveryContext, Notifier, NotifierConfig, Rollbar};
//!
//! let rollbar = Rollbar::new(
//!     NotifierConfig::new(token).with_environment("production"),
//! )?;
//!
//! let event = Event::new(
//!     ObjectReference::new("Pod", "web-0", "default"),
//!     Severity::Error,
//!     "CrashLoopBackOff",
//! );
//!
//! let ctx = DeliveryContext::new().with_timeout(Duration::from_secs(30));
//! match rollbar.post(&ctx, &event).await {
//!     Ok(outcome) => tracing::debug!(?outcome, "posted"),
//!     Err(err) => tracing::warn!(error = %err, "rollbar delivery failed"),
//! }
//! ```

mod client;
mod config;
mod context;
mod error;
mod filter;
mod notifier;
mod observer;
pub mod providers;
pub mod retry;
pub mod signature;

pub use client::{MAX_RETRY_AFTER, ResilientClient, SendReport};
pub use config::{DEFAULT_TIMEOUT, NotifierConfig, TransportConfig, TrustStore};
pub use context::{DeliveryContext, Interruption};
pub use error::{ConfigError, DeliveryError, NotifierResult};
pub use filter::SeverityFilter;
pub use notifier::{BoxedNotifier, DeliveryOutcome, Notifier};
pub use observer::{AttemptRecord, DeliveryObserver, NoopObserver};
pub use providers::{Forwarder, Rollbar};
pub use retry::{ExponentialBackoff, FixedDelay, NoRetry, RetryStrategy};
pub use signature::PayloadSigner;

pub use alertbridge_events::{Event, ObjectReference, Severity};
