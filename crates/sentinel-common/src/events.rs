//! Domain Events - Record significant occurrences in the domain
//!
//! Events are:
//! - Immutable records of past occurrences
//! - Named in past tense
//! - Published with at-least-once delivery, so consumers must be idempotent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Base event metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Unique event ID, stable across redeliveries
    pub event_id: Uuid,
    /// Time the event was raised
    pub timestamp: DateTime<Utc>,
    /// Aggregate ID
    pub aggregate_id: String,
    /// Aggregate type
    pub aggregate_type: String,
}

impl EventMetadata {
    /// Create metadata for a freshly raised event
    pub fn new(aggregate_id: impl ToString, aggregate_type: &str) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            aggregate_id: aggregate_id.to_string(),
            aggregate_type: aggregate_type.to_string(),
        }
    }
}

/// Domain event trait
pub trait DomainEvent: Send + Sync {
    /// Routing key the event is published under
    fn event_type(&self) -> &'static str;
    /// Event metadata
    fn metadata(&self) -> &EventMetadata;
}
