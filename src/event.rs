//! Immutable, schema-backed stream events.
//!
//! An `Event` is the unit the engine ingests: a fixed-shape attribute row
//! stamped with a monotonic id at construction time. Events are never
//! mutated after creation (§3/§5); the fixed-count-window rewrite in
//! [`crate::model::EvaluationModel`] constructs a *new* `Event` with the
//! timestamp attribute replaced rather than mutating one in place.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::schema::EventSchema;
use crate::value::Value;

/// Timestamps and window sizes share this type.
pub type Timestamp = i64;

/// Monotonic identifier assigned at ingestion, used for O(1) event-identity
/// comparisons (invariant I2) instead of hashing the full attribute tuple
/// (§9 Design Notes' preferred alternative).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(0);

/// Allocates the next monotonic [`EventId`]. Exposed so that reference
/// `EventSource` implementations (and tests) can assign ids as events are
/// read off a stream.
pub fn next_event_id() -> EventId {
    EventId(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
}

/// An immutable, schema-backed event.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: EventId,
    pub schema: Arc<EventSchema>,
    pub values: Vec<Value>,
}

impl Event {
    pub fn new(id: EventId, schema: Arc<EventSchema>, values: Vec<Value>) -> Self {
        Self { id, schema, values }
    }

    /// The designated timestamp attribute, coerced to an integer tick.
    pub fn timestamp(&self) -> Timestamp {
        match &self.values[self.schema.timestamp_index] {
            Value::Int(i) => *i,
            Value::Float(f) => *f as i64,
            Value::Str(s) => s.parse().unwrap_or_default(),
        }
    }

    /// The designated type attribute, as its display string (used for EventNode
    /// type matching).
    pub fn type_tag(&self) -> String {
        self.values[self.schema.type_index].display()
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).map(|idx| &self.values[idx])
    }

    pub fn attr_at(&self, index: usize) -> &Value {
        &self.values[index]
    }

    /// Returns a clone of this event with the timestamp attribute replaced,
    /// used for fixed-count-window queries (§4.7). Preserves immutability by
    /// constructing a new event rather than mutating `self`.
    pub fn with_timestamp(&self, counter: Timestamp) -> Event {
        let mut values = self.values.clone();
        values[self.schema.timestamp_index] = Value::Int(counter);
        Event {
            id: self.id,
            schema: self.schema.clone(),
            values,
        }
    }

    /// Comma-joined attribute values, used by the file output sink.
    pub fn display_line(&self) -> String {
        self.values
            .iter()
            .map(Value::display)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<EventSchema> {
        EventSchema::new(vec!["time".into(), "type".into(), "volume".into()], 0, 1)
    }

    #[test]
    fn timestamp_reads_designated_column() {
        let e = Event::new(next_event_id(), schema(), vec![Value::Int(10), Value::Str("A".into()), Value::Int(5)]);
        assert_eq!(e.timestamp(), 10);
    }

    #[test]
    fn with_timestamp_preserves_other_columns_and_identity() {
        let e = Event::new(next_event_id(), schema(), vec![Value::Int(10), Value::Str("A".into()), Value::Int(5)]);
        let rewritten = e.with_timestamp(3);
        assert_eq!(rewritten.timestamp(), 3);
        assert_eq!(rewritten.type_tag(), "A");
        assert_eq!(rewritten.id, e.id);
    }

    #[test]
    fn events_are_identified_by_id_not_content() {
        let a = Event::new(next_event_id(), schema(), vec![Value::Int(1), Value::Str("A".into()), Value::Int(5)]);
        let b = Event::new(next_event_id(), schema(), vec![Value::Int(1), Value::Str("A".into()), Value::Int(5)]);
        assert_ne!(a, b, "identical attributes but distinct ids are distinct events");
    }
}
