//! Partial-result algebra (§4.1).
//!
//! A `PartialResult` is a match assembled so far: a map from `Identifier` to
//! either a raw `Event` or another (operator-tagged) `PartialResult`, plus
//! the `[start_time, end_time]` span of its constituents.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::event::{Event, EventId, Timestamp};
use crate::graph::Identifier;
use crate::operator::OperatorKind;

/// One compositional child of a [`PartialResult`]: either a raw leaf event
/// or a nested, operator-tagged sub-result.
#[derive(Debug, Clone)]
pub enum Component {
    Event(Arc<Event>),
    Nested(Arc<PartialResult>),
}

/// An in-progress (or complete, at the root) match.
#[derive(Debug, Clone)]
pub struct PartialResult {
    /// The identifier this result is addressed by from its parent's perspective:
    /// the leaf's event-identifier for an event wrapper, or the producing
    /// ConditionNode's own identifier for a composite.
    pub identifier: Identifier,
    pub components: BTreeMap<Identifier, Component>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    /// `None` for a plain event wrapper; `Some(kind)` for anything built by
    /// an operator. Governs the opaque-vs-flatten rule in [`Self::combine`].
    pub operator_tag: Option<OperatorKind>,
}

impl PartialResult {
    /// Wraps a single event as a unary partial result (§4.1 "Event wrapping").
    pub fn from_event(identifier: Identifier, event: Arc<Event>) -> Self {
        let ts = event.timestamp();
        let mut components = BTreeMap::new();
        components.insert(identifier, Component::Event(event));
        Self {
            identifier,
            components,
            start_time: ts,
            end_time: ts,
            operator_tag: None,
        }
    }

    /// Combines a tuple of contributing partial results into a new one tagged
    /// with `kind` at `identifier` (§4.1 "Combination").
    ///
    /// A contributor with `operator_tag: Some(_)` is inserted opaquely under
    /// its own identifier, preserving operator provenance. A contributor with
    /// `operator_tag: None` (a plain event wrapper, or, for future
    /// pass-through operators like OR, any untagged composite) has its
    /// component map flattened in directly.
    pub fn combine(parts: &[Arc<PartialResult>], kind: OperatorKind, identifier: Identifier) -> Self {
        let mut components = BTreeMap::new();
        for part in parts {
            match part.operator_tag {
                Some(_) => {
                    components.insert(part.identifier, Component::Nested(part.clone()));
                }
                None => {
                    for (id, component) in &part.components {
                        components.insert(*id, component.clone());
                    }
                }
            }
        }
        let start_time = parts.iter().map(|p| p.start_time).min().expect("combine requires at least one part");
        let end_time = parts.iter().map(|p| p.end_time).max().expect("combine requires at least one part");
        Self {
            identifier,
            components,
            start_time,
            end_time,
            operator_tag: Some(kind),
        }
    }

    /// Returns a map keyed by the identifiers of the immediate compositional
    /// children, stopping at operator boundaries. For any result produced by
    /// `combine` this is simply `self.components`, since the opaque/flatten
    /// decision was already applied at construction time.
    pub fn unpack(&self) -> &BTreeMap<Identifier, Component> {
        &self.components
    }

    /// Recursively descends to raw events, returning a map from event
    /// identifier to the underlying event. Used by conditions, which must
    /// read event attributes directly regardless of nesting depth.
    pub fn completely_unpack(&self) -> BTreeMap<Identifier, Arc<Event>> {
        let mut out = BTreeMap::new();
        self.completely_unpack_into(&mut out);
        out
    }

    fn completely_unpack_into(&self, out: &mut BTreeMap<Identifier, Arc<Event>>) {
        for (id, component) in &self.components {
            match component {
                Component::Event(event) => {
                    out.insert(*id, event.clone());
                }
                Component::Nested(sub) => sub.completely_unpack_into(out),
            }
        }
    }

    /// All raw event ids reachable from this result, used for invariant I2's
    /// pairwise-distinct check across a candidate combination.
    pub fn event_ids(&self) -> Vec<EventId> {
        self.completely_unpack().values().map(|e| e.id).collect()
    }
}
