//! Per-call delivery context: cancellation and deadline.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a delivery was interrupted by its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// The cancellation token fired.
    Cancelled,
    /// The deadline passed.
    DeadlineExceeded,
}

impl Interruption {
    /// Returns the interruption as a short lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interruption::Cancelled => "cancelled",
            Interruption::DeadlineExceeded => "deadline exceeded",
        }
    }
}

impl std::fmt::Display for Interruption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied scope for a single `post` call.
///
/// Cancelling one context never affects deliveries running under another.
/// Cloning shares the token, so a clone can be handed to whoever decides
/// to cancel.
#[derive(Debug, Clone)]
pub struct DeliveryContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl DeliveryContext {
    /// Creates a context with no deadline that is never cancelled unless
    /// `cancel` is called.
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Creates a context driven by an existing token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    /// Sets an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns the cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels every delivery running under this context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns the interruption if the context is already done.
    pub fn interruption(&self) -> Option<Interruption> {
        if self.cancel.is_cancelled() {
            return Some(Interruption::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interruption::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> Interruption {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancel.cancelled() => Interruption::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Interruption::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                Interruption::Cancelled
            }
        }
    }
}

impl Default for DeliveryContext {
    fn default() -> Self {
        Self::new()
    }
}
