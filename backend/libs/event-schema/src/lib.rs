use chrono::{DateTime, Utc};
/// Event Schema Registry for interaction events consumed by the taste ranking core
///
/// This library defines versioned input records so the learning pipeline and the
/// services that record swipes and reviews agree on payload shape. Each envelope
/// carries a required `schema_version` field.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Review records and item metadata consumed by truth aggregation
pub mod review;

pub use review::{ItemMetadata, ReviewRecord, TriState};

/// Current schema version for all events
pub const SCHEMA_VERSION: u32 = 1;

/// Lowest accepted review rating
pub const MIN_RATING: u8 = 1;
/// Highest accepted review rating
pub const MAX_RATING: u8 = 5;

/// Base event envelope for interaction messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    /// Unique envelope ID for idempotency and tracing
    pub event_id: Uuid,
    /// Envelope timestamp
    pub timestamp: DateTime<Utc>,
    /// Schema version for compatibility checking
    pub schema_version: u32,
    /// Source service that generated the event
    pub source: String,
    /// Correlation ID for distributed tracing
    pub correlation_id: Option<Uuid>,
    /// Actual event payload
    pub data: T,
}

impl<T> EventEnvelope<T> {
    pub fn new(source: impl Into<String>, data: T) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            schema_version: SCHEMA_VERSION,
            source: source.into(),
            correlation_id: None,
            data,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Whether this envelope was written by a schema this build understands
    pub fn is_compatible(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }
}

// ============================================================================
// INTERACTION EVENTS
// ============================================================================

/// Kind of interaction, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Swipe,
    Review,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Swipe => "swipe",
            InteractionKind::Review => "review",
        }
    }
}

/// Directional signal carried by an interaction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionPayload {
    Swipe { liked: bool },
    Review { rating: u8 },
}

/// Immutable record of one user interacting with one food item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: InteractionPayload,
}

impl InteractionEvent {
    pub fn swipe(user_id: Uuid, item_id: Uuid, liked: bool, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            item_id,
            timestamp,
            payload: InteractionPayload::Swipe { liked },
        }
    }

    pub fn review(user_id: Uuid, item_id: Uuid, rating: u8, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            item_id,
            timestamp,
            payload: InteractionPayload::Review { rating },
        }
    }

    pub fn kind(&self) -> InteractionKind {
        match self.payload {
            InteractionPayload::Swipe { .. } => InteractionKind::Swipe,
            InteractionPayload::Review { .. } => InteractionKind::Review,
        }
    }

    /// Build the interaction event a stored review implies
    pub fn from_review(review: &ReviewRecord) -> Self {
        Self {
            id: review.id,
            user_id: review.user_id,
            item_id: review.item_id,
            timestamp: review.created_at,
            payload: InteractionPayload::Review {
                rating: review.rating,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swipe_payload_wire_format() {
        let event = InteractionEvent::swipe(Uuid::new_v4(), Uuid::new_v4(), true, Utc::now());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["payload"]["kind"], "swipe");
        assert_eq!(json["payload"]["liked"], true);
        assert_eq!(event.kind(), InteractionKind::Swipe);
    }

    #[test]
    fn test_review_payload_parses() {
        let json = r#"{
            "id": "7f1c3f5e-3a55-4c43-9d7b-3f6f1c2f0a11",
            "user_id": "0b3f0a5a-2a8e-4b87-8f3c-2c7d3b1c9e01",
            "item_id": "c1a2b3c4-d5e6-47f8-9a0b-1c2d3e4f5a6b",
            "timestamp": "2025-11-13T01:16:00Z",
            "payload": { "kind": "review", "rating": 4 }
        }"#;

        let event: InteractionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind(), InteractionKind::Review);
        assert_eq!(event.payload, InteractionPayload::Review { rating: 4 });
    }

    #[test]
    fn test_envelope_carries_schema_version() {
        let correlation = Uuid::new_v4();
        let envelope = EventEnvelope::new("swipe-api", 42u32).with_correlation_id(correlation);

        assert_eq!(envelope.schema_version, SCHEMA_VERSION);
        assert_eq!(envelope.correlation_id, Some(correlation));
        assert!(envelope.is_compatible());
    }
}
