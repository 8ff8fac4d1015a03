//! Predicates over a partial result's constituent events (§3 Condition).
//!
//! A condition is identified by an ordered list of event-identifiers; it is
//! evaluated by resolving those identifiers against a partial result's
//! [`PartialResult::completely_unpack`] map and invoking a closure over the
//! resolved events in declared order. Per §9 Design Notes, the closure
//! closes over whatever column indices it needs rather than attribute-name
//! strings. Callers build these with [`crate::event::Event::attr`] or by
//! capturing indices resolved once against a known [`crate::schema::EventSchema`].

use std::sync::Arc;

use crate::error::CepError;
use crate::event::Event;
use crate::graph::Identifier;
use crate::partial_result::PartialResult;

type PredicateFn = dyn Fn(&[&Event]) -> Result<bool, CepError> + Send + Sync;

#[derive(Clone)]
pub struct Condition {
    pub identifiers: Vec<Identifier>,
    predicate: Arc<PredicateFn>,
}

impl Condition {
    pub fn new<F>(identifiers: Vec<Identifier>, predicate: F) -> Self
    where
        F: Fn(&[&Event]) -> Result<bool, CepError> + Send + Sync + 'static,
    {
        Self {
            identifiers,
            predicate: Arc::new(predicate),
        }
    }

    /// Resolves this condition's identifiers against `result` and invokes the predicate.
    pub fn check(&self, result: &PartialResult) -> Result<bool, CepError> {
        let unpacked = result.completely_unpack();
        let mut events = Vec::with_capacity(self.identifiers.len());
        for id in &self.identifiers {
            let event = unpacked.get(id).ok_or(CepError::UnknownIdentifier(*id))?;
            events.push(event.as_ref());
        }
        (self.predicate)(&events)
    }
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Condition").field("identifiers", &self.identifiers).finish_non_exhaustive()
    }
}

/// Evaluates every condition in `conditions` against `result`, short-circuiting
/// on the first failure or error.
pub fn check_all(conditions: &[Condition], result: &PartialResult) -> Result<bool, CepError> {
    for condition in conditions {
        if !condition.check(result)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::next_event_id;
    use crate::schema::EventSchema;
    use crate::value::Value;

    fn schema() -> Arc<EventSchema> {
        EventSchema::new(vec!["t".into(), "type".into(), "v".into()], 0, 1)
    }

    fn wrap(id: Identifier, t: i64, ty: &str, v: i64) -> PartialResult {
        let event = Arc::new(Event::new(next_event_id(), schema(), vec![Value::Int(t), Value::Str(ty.into()), Value::Int(v)]));
        PartialResult::from_event(id, event)
    }

    #[test]
    fn predicate_sees_events_in_declared_order() {
        let cond = Condition::new(vec![0, 1], |events| {
            let a = events[0].attr("v").and_then(Value::as_i64).unwrap_or(0);
            let b = events[1].attr("v").and_then(Value::as_i64).unwrap_or(0);
            Ok(a > b)
        });
        let a = wrap(0, 1, "A", 10);
        let b = wrap(1, 2, "B", 3);
        let combined = PartialResult::combine(
            &[std::sync::Arc::new(a), std::sync::Arc::new(b)],
            crate::operator::OperatorKind::And,
            -1,
        );
        assert!(cond.check(&combined).unwrap());
    }

    #[test]
    fn unknown_identifier_surfaces_as_error() {
        let cond = Condition::new(vec![5], |_events| Ok(true));
        let pr = wrap(0, 1, "A", 1);
        assert!(matches!(cond.check(&pr), Err(CepError::UnknownIdentifier(5))));
    }
}
