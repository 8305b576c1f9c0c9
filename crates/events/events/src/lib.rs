//! # AlertBridge Events
//!
//! Operational event model consumed by the AlertBridge notifiers:
//! - Events reported by controllers about an involved object
//! - Ordered severities used to gate outbound notifications
//! - Free-form metadata attached by the reporting controller
//!
//! ## Example
//!
//! ```rust,ignore
//! use alertbridge_events::{Event, ObjectReference, Severity};
//!
//! let event = Event::new(
//!     ObjectReference::new("Kustomization", "apps", "flux-system"),
//!     Severity::Error,
//!     "health check failed",
//! )
//! .with_source("kustomize-controller")
//! .with_reason("HealthCheckFailed");
//! ```

mod error;
mod event;
mod severity;

pub use error::{EventError, EventResult};
pub use event::{Event, ObjectReference};
pub use severity::Severity;

/// Common event reasons emitted by reconciling controllers.
pub mod reasons {
    /// The object was reconciled successfully.
    pub const RECONCILIATION_SUCCEEDED: &str = "ReconciliationSucceeded";
    /// Reconciliation of the object failed.
    pub const RECONCILIATION_FAILED: &str = "ReconciliationFailed";
    /// Health checks for the object failed.
    pub const HEALTH_CHECK_FAILED: &str = "HealthCheckFailed";
}
