//! Operator combinators (§4.2).
//!
//! `OperatorSpec` is the tagged variant Design Notes §9 calls for in place of
//! operator-identity-by-class: dispatch on the enum rather than a dynamic
//! type test. `StrictSeq` from the Open Questions section is folded into
//! `Seq` via a `strict` flag rather than a separate variant, since both orderings
//! share every line of the combinator except the final comparison operator.
//!
//! The OR / Kleene-star extension point described in §4.2 is a contract an
//! operator must satisfy (same `new_results` signature); no variant is added
//! for it here since nothing in this crate constructs one yet.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use itertools_like::cartesian_product;

use crate::graph::Identifier;
use crate::partial_result::PartialResult;

mod itertools_like {
    /// Cartesian product over a slice of slices, without pulling in a crate
    /// for a single small combinator.
    pub fn cartesian_product<T: Clone>(lists: &[Vec<T>]) -> Vec<Vec<T>> {
        let mut result: Vec<Vec<T>> = vec![vec![]];
        for list in lists {
            let mut next = Vec::with_capacity(result.len() * list.len().max(1));
            for partial in &result {
                for item in list {
                    let mut extended = partial.clone();
                    extended.push(item.clone());
                    next.push(extended);
                }
            }
            result = next;
        }
        result
    }
}

/// Provenance tag recorded on every [`PartialResult`] built by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Seq,
    And,
}

/// The operator attached to a `ConditionNode`.
#[derive(Debug, Clone)]
pub enum OperatorSpec {
    /// Ordered temporal sequence. `order` lists this node's own children's
    /// identifiers in the desired temporal order: a property of the
    /// operator, not of how the children happen to be laid out as a tree.
    Seq { order: Vec<Identifier>, strict: bool },
    /// Unordered co-occurrence.
    And,
}

impl OperatorSpec {
    pub fn kind(&self) -> OperatorKind {
        match self {
            OperatorSpec::Seq { .. } => OperatorKind::Seq,
            OperatorSpec::And => OperatorKind::And,
        }
    }

    /// Common procedure (§4.2): Cartesian product of sibling buffers plus the
    /// diffuser, reject duplicate-event tuples (I2), apply operator-specific
    /// acceptance, tag and return survivors.
    pub fn new_results(
        &self,
        sibling_buffers: &[Vec<Arc<PartialResult>>],
        diffuser: Arc<PartialResult>,
        node_identifier: Identifier,
    ) -> Vec<PartialResult> {
        let mut lists: Vec<Vec<Arc<PartialResult>>> = sibling_buffers.to_vec();
        lists.push(vec![diffuser]);

        let mut out = Vec::new();
        for tuple in cartesian_product(&lists) {
            if contains_duplicate_event(&tuple) {
                continue;
            }
            if !self.accepts(&tuple) {
                continue;
            }
            out.push(PartialResult::combine(&tuple, self.kind(), node_identifier));
        }
        out
    }

    fn accepts(&self, tuple: &[Arc<PartialResult>]) -> bool {
        match self {
            OperatorSpec::And => true,
            OperatorSpec::Seq { order, strict } => {
                let shallow: BTreeMap<Identifier, &Arc<PartialResult>> =
                    tuple.iter().map(|p| (p.identifier, p)).collect();
                let Some(ordered): Option<Vec<&Arc<PartialResult>>> =
                    order.iter().map(|id| shallow.get(id).copied()).collect()
                else {
                    // an identifier in `order` wasn't present among this node's
                    // immediate children. validate_pattern should have caught
                    // this at build time; treat defensively as a non-match.
                    return false;
                };
                ordered.windows(2).all(|pair| {
                    if *strict {
                        pair[0].end_time < pair[1].start_time
                    } else {
                        pair[0].end_time <= pair[1].start_time
                    }
                })
            }
        }
    }
}

fn contains_duplicate_event(tuple: &[Arc<PartialResult>]) -> bool {
    let mut seen = HashSet::new();
    for part in tuple {
        for id in part.event_ids() {
            if !seen.insert(id) {
                return true;
            }
        }
    }
    false
}
