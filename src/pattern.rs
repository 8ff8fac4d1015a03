//! Pattern query declaration and static validation (§3, §4.3 I5/I6).
//!
//! A [`Query`] is the user-facing description of what to match; a
//! [`GraphInitializer`](crate::initializer::GraphInitializer) turns one into a
//! [`crate::graph::PatternQueryGraph`]. Validation lives here rather than in
//! the initializer so a malformed query is rejected before any graph is built.

use std::collections::HashSet;

use crate::condition::Condition;
use crate::error::CepError;
use crate::event::Timestamp;
use crate::graph::Identifier;

/// The operator template attached to an interior pattern node. Distinct from
/// [`crate::operator::OperatorSpec`]: this is authored by the caller before
/// the `order` list is known to be well-formed, and before `strict` has been
/// validated against the pattern's leaves.
#[derive(Debug, Clone)]
pub enum OperatorTemplate {
    /// `order` must be a permutation of the identifiers of this node's direct
    /// children (leaf identifiers or nested `Sub` identifiers, not their
    /// recursively-contained leaves; §4.3 I5).
    Seq { order: Vec<Identifier>, strict: bool },
    And,
}

/// A pattern expression tree (§3).
#[derive(Debug, Clone)]
pub enum PatternExpr {
    Leaf { event_type: String, identifier: Identifier },
    Sub { operator: OperatorTemplate, children: Vec<PatternExpr>, identifier: Identifier },
}

impl PatternExpr {
    pub fn identifier(&self) -> Identifier {
        match self {
            PatternExpr::Leaf { identifier, .. } => *identifier,
            PatternExpr::Sub { identifier, .. } => *identifier,
        }
    }

    /// All leaf identifiers reachable under this node, in no particular order.
    pub fn leaf_identifiers(&self) -> Vec<Identifier> {
        let mut out = Vec::new();
        self.collect_leaf_identifiers(&mut out);
        out
    }

    fn collect_leaf_identifiers(&self, out: &mut Vec<Identifier>) {
        match self {
            PatternExpr::Leaf { identifier, .. } => out.push(*identifier),
            PatternExpr::Sub { children, .. } => {
                for child in children {
                    child.collect_leaf_identifiers(out);
                }
            }
        }
    }
}

/// A complete pattern query: the expression tree, its cross-cutting
/// conditions, and its window (§3, §4.6, §4.7).
#[derive(Debug, Clone)]
pub struct Query {
    pub pattern: PatternExpr,
    pub conditions: Vec<Condition>,
    pub window: Timestamp,
    /// When `true`, events are assigned ordinal timestamps on ingestion
    /// (§4.7) rather than using their stream timestamp; `window` is then a
    /// match count rather than a duration.
    pub fixed_count_window: bool,
}

/// Validates a query's static invariants (I5: every leaf identifier used by a
/// condition or a SEQ `order` list exists and is unique; I6: a SEQ node's
/// `order` is exactly a permutation of its own direct children's
/// identifiers: no more, no fewer, no duplicates).
pub fn validate_pattern(query: &Query) -> Result<(), CepError> {
    let all_leaves = query.pattern.leaf_identifiers();
    let mut seen = HashSet::new();
    for id in &all_leaves {
        if !seen.insert(*id) {
            return Err(CepError::MalformedPattern(format!("duplicate leaf identifier {id}")));
        }
    }

    validate_node(&query.pattern)?;

    for condition in &query.conditions {
        for id in &condition.identifiers {
            if !all_leaves.contains(id) {
                return Err(CepError::UnknownIdentifier(*id));
            }
        }
    }

    Ok(())
}

fn validate_node(node: &PatternExpr) -> Result<(), CepError> {
    let PatternExpr::Sub { operator, children, identifier } = node else {
        return Ok(());
    };
    for child in children {
        validate_node(child)?;
    }
    if let OperatorTemplate::Seq { order, .. } = operator {
        let direct: HashSet<Identifier> = children.iter().map(PatternExpr::identifier).collect();
        let ordered: HashSet<Identifier> = order.iter().copied().collect();
        if direct.len() != order.len() || direct != ordered {
            return Err(CepError::MalformedPattern(format!(
                "SEQ node {identifier} has order {order:?}, which is not a permutation of its children's identifiers"
            )));
        }
    }
    if children.len() < 2 {
        return Err(CepError::MalformedPattern(format!(
            "composite node {identifier} must combine at least two children"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: Identifier, ty: &str) -> PatternExpr {
        PatternExpr::Leaf { event_type: ty.into(), identifier: id }
    }

    #[test]
    fn well_formed_seq_validates() {
        let query = Query {
            pattern: PatternExpr::Sub {
                operator: OperatorTemplate::Seq { order: vec![0, 1], strict: false },
                children: vec![leaf(0, "A"), leaf(1, "B")],
                identifier: -1,
            },
            conditions: vec![],
            window: 10,
            fixed_count_window: false,
        };
        assert!(validate_pattern(&query).is_ok());
    }

    #[test]
    fn seq_order_not_matching_children_is_rejected() {
        let query = Query {
            pattern: PatternExpr::Sub {
                operator: OperatorTemplate::Seq { order: vec![0, 2], strict: false },
                children: vec![leaf(0, "A"), leaf(1, "B")],
                identifier: -1,
            },
            conditions: vec![],
            window: 10,
            fixed_count_window: false,
        };
        assert!(matches!(validate_pattern(&query), Err(CepError::MalformedPattern(_))));
    }

    #[test]
    fn duplicate_leaf_identifiers_are_rejected() {
        let query = Query {
            pattern: PatternExpr::Sub {
                operator: OperatorTemplate::And,
                children: vec![leaf(0, "A"), leaf(0, "B")],
                identifier: -1,
            },
            conditions: vec![],
            window: 10,
            fixed_count_window: false,
        };
        assert!(matches!(validate_pattern(&query), Err(CepError::MalformedPattern(_))));
    }

    #[test]
    fn condition_referencing_unknown_identifier_is_rejected() {
        let query = Query {
            pattern: PatternExpr::Sub {
                operator: OperatorTemplate::And,
                children: vec![leaf(0, "A"), leaf(1, "B")],
                identifier: -1,
            },
            conditions: vec![Condition::new(vec![5], |_| Ok(true))],
            window: 10,
            fixed_count_window: false,
        };
        assert!(matches!(validate_pattern(&query), Err(CepError::UnknownIdentifier(5))));
    }
}
