//! Event types and structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::EventResult;
use crate::severity::Severity;

/// An operational event reported by a controller about an involved object.
///
/// Events are built once by the producing subsystem and then only borrowed;
/// the builder methods consume `self` so there is no in-place mutation API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// The object this event is about.
    pub involved_object: ObjectReference,
    /// Event criticality.
    pub severity: Severity,
    /// When the event was observed by the reporting controller.
    pub timestamp: DateTime<Utc>,
    /// Human readable description.
    pub message: String,
    /// Short machine understandable reason, e.g. `ReconciliationFailed`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    /// Extra key/value pairs attached by the reporting controller.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Name of the controller that emitted the event.
    #[serde(rename = "reportingController")]
    pub source: String,
    /// Instance (pod) of the controller that emitted the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporting_instance: Option<String>,
}

impl Event {
    /// Creates a new event stamped with the current time.
    pub fn new(
        involved_object: ObjectReference,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            involved_object,
            severity,
            timestamp: Utc::now(),
            message: message.into(),
            reason: String::new(),
            metadata: BTreeMap::new(),
            source: String::new(),
            reporting_instance: None,
        }
    }

    /// Sets the reporting controller name.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the event reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Overrides the observation timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the reporting controller instance.
    pub fn with_reporting_instance(mut self, instance: impl Into<String>) -> Self {
        self.reporting_instance = Some(instance.into());
        self
    }

    /// Returns true if this event is at least as severe as `threshold`.
    pub fn is_at_least(&self, threshold: Severity) -> bool {
        self.severity >= threshold
    }

    /// Decodes an event from its JSON wire form.
    pub fn from_json(bytes: &[u8]) -> EventResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Reference to the object an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjectReference {
    /// Object kind, e.g. `Pod` or `Kustomization`.
    pub kind: String,
    /// Object name.
    pub name: String,
    /// Object namespace.
    #[serde(default)]
    pub namespace: String,
}

impl ObjectReference {
    /// Creates a new object reference.
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}
