//! Optional delivery observation hook.
//!
//! Notifiers log through `tracing` already; an observer is for callers that
//! want to feed metrics or their own sinks. Observers never see the
//! credential or the request body.

use std::time::Duration;
use uuid::Uuid;

use crate::error::NotifierResult;
use crate::notifier::DeliveryOutcome;

/// Record of one HTTP attempt.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// Correlates every attempt of one `post` call.
    pub delivery_id: Uuid,
    /// Target URL.
    pub target: String,
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// Response status, if a response was received.
    pub status: Option<u16>,
    /// Wall time spent on the attempt.
    pub elapsed: Duration,
    /// Transport or status error, if the attempt failed.
    pub error: Option<String>,
    /// Whether another attempt will follow.
    pub will_retry: bool,
}

/// Receives delivery lifecycle callbacks. All methods default to no-ops.
pub trait DeliveryObserver: Send + Sync {
    /// Called after every HTTP attempt.
    fn on_attempt(&self, _record: &AttemptRecord) {}

    /// Called once per `post` call with its final result.
    fn on_outcome(&self, _provider: &'static str, _result: &NotifierResult<DeliveryOutcome>) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DeliveryObserver for NoopObserver {}
