//! Event schema: the static shape shared by every event on a stream.
//!
//! Replaces the source's name-indexed attribute bag resolved at predicate
//! call time (§9 Design Notes) with an ordered attribute-name list plus the
//! fixed column indices of the timestamp and type attributes. Events hold a
//! shared `Arc<EventSchema>` and a parallel `Vec<Value>`; predicates close
//! over column indices rather than attribute-name strings.

use std::sync::Arc;

use crate::error::CepError;

/// The column layout of every event on one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSchema {
    pub attribute_names: Vec<String>,
    pub timestamp_index: usize,
    pub type_index: usize,
}

impl EventSchema {
    pub fn new(attribute_names: Vec<String>, timestamp_index: usize, type_index: usize) -> Arc<Self> {
        Arc::new(Self {
            attribute_names,
            timestamp_index,
            type_index,
        })
    }

    /// Resolves an attribute name to its column index.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attribute_names.iter().position(|n| n == name)
    }

    /// Resolves an attribute name to its column index, or a [`CepError::UnknownAttribute`].
    pub fn require_index(&self, name: &str) -> Result<usize, CepError> {
        self.index_of(name)
            .ok_or_else(|| CepError::UnknownAttribute(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_attribute() {
        let schema = EventSchema::new(vec!["time".into(), "type".into(), "volume".into()], 0, 1);
        assert_eq!(schema.index_of("volume"), Some(2));
    }

    #[test]
    fn unknown_attribute_is_none() {
        let schema = EventSchema::new(vec!["time".into(), "type".into()], 0, 1);
        assert_eq!(schema.index_of("nope"), None);
    }
}
