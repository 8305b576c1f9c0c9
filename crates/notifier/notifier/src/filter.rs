//! Severity gate applied before any payload is built.

use alertbridge_events::{Event, Severity};

/// Decides whether an event warrants an external notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityFilter {
    threshold: Severity,
}

impl SeverityFilter {
    /// Forwards events at or above `threshold`.
    pub fn new(threshold: Severity) -> Self {
        Self { threshold }
    }

    /// Forwards every event.
    pub fn allow_all() -> Self {
        Self::new(Severity::Info)
    }

    /// Returns the configured threshold.
    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    /// Returns true if `event` should be sent.
    pub fn allows(&self, event: &Event) -> bool {
        event.is_at_least(self.threshold)
    }
}

impl Default for SeverityFilter {
    /// Only errors are forwarded by default.
    fn default() -> Self {
        Self::new(Severity::Error)
    }
}
