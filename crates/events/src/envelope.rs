use serde::{Deserialize, Serialize};
use uuid::Uuid;

use forgelend_core::PoolId;

/// Envelope for an event, containing stream metadata.
///
/// This is the unit a pool appends to its journal and publishes.
///
/// - `sequence_number` is monotonically increasing per pool, starting at 1,
///   and equals the pool version after the event was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    pool_id: PoolId,
    aggregate_type: String,

    /// Monotonically increasing position in the pool stream.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        pool_id: PoolId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            pool_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn pool_id(&self) -> PoolId {
        self.pool_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_metadata_and_payload() {
        let pool_id = PoolId::new();
        let env = EventEnvelope::new(Uuid::now_v7(), pool_id, "lending.pool", 3, 42u64);

        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["sequence_number"], 3);
        assert_eq!(json["payload"], 42);
        assert_eq!(json["aggregate_type"], "lending.pool");

        let back: EventEnvelope<u64> = serde_json::from_value(json).unwrap();
        assert_eq!(back, env);
        assert_eq!(back.pool_id(), pool_id);
    }
}
