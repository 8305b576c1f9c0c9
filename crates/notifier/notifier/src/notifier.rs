//! The notifier contract shared by every provider.

use alertbridge_events::Event;
use async_trait::async_trait;
use std::sync::Arc;

use crate::context::DeliveryContext;
use crate::error::NotifierResult;

/// Result of a `post` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The backend accepted the notification.
    Delivered {
        /// 2xx status returned by the backend.
        status: u16,
        /// Number of requests issued.
        attempts: u32,
    },
    /// The event was below the severity threshold; nothing was sent.
    Skipped,
}

impl DeliveryOutcome {
    /// Returns true if the notification was sent.
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    /// Returns true if the event was filtered out.
    pub fn is_skipped(&self) -> bool {
        matches!(self, DeliveryOutcome::Skipped)
    }
}

/// A backend that events can be posted to.
///
/// Implementations hold only immutable configuration and a pooled HTTP
/// client, so one instance may be shared across tasks.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Provider name used in logs, e.g. `"rollbar"`.
    fn provider(&self) -> &'static str;

    /// Posts `event` to the backend.
    ///
    /// Events below the severity threshold return `Ok(Skipped)` without
    /// touching the network. Failures are returned, never panicked on.
    async fn post(&self, ctx: &DeliveryContext, event: &Event) -> NotifierResult<DeliveryOutcome>;
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn provider(&self) -> &'static str {
        (**self).provider()
    }

    async fn post(&self, ctx: &DeliveryContext, event: &Event) -> NotifierResult<DeliveryOutcome> {
        (**self).post(ctx, event).await
    }
}

/// Boxed notifier for heterogeneous collections.
pub type BoxedNotifier = Box<dyn Notifier>;
