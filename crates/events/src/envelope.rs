use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::Event;

/// Envelope for a published event, carrying stream metadata.
///
/// - `aggregate_key` identifies the aggregate instance (a stock key such as
///   `"<product>@<location>"`, or a document id).
/// - `sequence_number` is the aggregate version reached by applying this event,
///   so it is monotonically increasing per aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,

    aggregate_type: String,
    aggregate_key: String,

    /// Aggregate version after this event was applied.
    sequence_number: u64,

    event_type: String,
    occurred_at: DateTime<Utc>,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        aggregate_type: impl Into<String>,
        aggregate_key: impl Into<String>,
        sequence_number: u64,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            aggregate_type: aggregate_type.into(),
            aggregate_key: aggregate_key.into(),
            sequence_number,
            event_type: event_type.into(),
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn aggregate_key(&self) -> &str {
        &self.aggregate_key
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl EventEnvelope<JsonValue> {
    /// Wrap a typed event as a JSON envelope, capturing its metadata.
    pub fn from_typed<E>(
        aggregate_type: impl Into<String>,
        aggregate_key: impl Into<String>,
        sequence_number: u64,
        event: &E,
    ) -> Result<Self, serde_json::Error>
    where
        E: Event + Serialize,
    {
        let payload = serde_json::to_value(event)?;
        Ok(Self::new(
            Uuid::now_v7(),
            aggregate_type,
            aggregate_key,
            sequence_number,
            event.event_type(),
            event.occurred_at(),
            payload,
        ))
    }

    /// Decode the JSON payload back into a typed event.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Received {
        quantity: i64,
        at: DateTime<Utc>,
    }

    impl Event for Received {
        fn event_type(&self) -> &'static str {
            "test.received"
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn from_typed_captures_metadata_and_decodes() {
        let event = Received {
            quantity: 7,
            at: Utc::now(),
        };
        let env = EventEnvelope::from_typed("test.stock", "p@l", 3, &event).unwrap();

        assert_eq!(env.aggregate_type(), "test.stock");
        assert_eq!(env.aggregate_key(), "p@l");
        assert_eq!(env.sequence_number(), 3);
        assert_eq!(env.event_type(), "test.received");
        assert_eq!(env.occurred_at(), event.at);
        assert_eq!(env.decode::<Received>().unwrap(), event);
    }
}
