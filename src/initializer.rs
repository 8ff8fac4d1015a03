//! Builds a [`PatternQueryGraph`] from a [`Query`] (§4.4).
//!
//! Two strategies are offered, mirroring `original_source/graph_based_processing/`:
//! a `LeftDeepTreeInitializer` that cascades every leaf into a binary chain
//! regardless of the pattern's authored shape, and a `NestedTreeInitializer`
//! that mirrors the pattern's `Sub` nesting directly. Both place each
//! condition at the shallowest (most specific) node whose leaves are a
//! superset of the condition's identifiers, via the shared
//! [`promote_conditions`] helper.

use std::collections::HashSet;

use petgraph::stable_graph::NodeIndex;

use crate::condition::Condition;
use crate::error::CepError;
use crate::graph::{Identifier, PatternQueryGraph};
use crate::operator::OperatorSpec;
use crate::pattern::{OperatorTemplate, PatternExpr, Query};

pub trait GraphInitializer {
    fn build(&self, query: &Query) -> Result<PatternQueryGraph, CepError>;
}

/// One node placed during a post-order build: its graph index and the set of
/// leaf identifiers reachable beneath it, used to decide where each
/// cross-cutting condition belongs.
struct Placed {
    index: NodeIndex,
    leaves: HashSet<Identifier>,
}

/// Finds, for each condition, the first (i.e. most specific; post-order
/// visits children before parents) placed node whose leaf set is a superset
/// of the condition's identifiers, and returns the conditions grouped by the
/// index of the node they attach to. Conditions that no single node's subtree
/// covers attach to the last (root) entry of `placed`.
fn promote_conditions(placed: &[Placed], conditions: &[Condition]) -> Vec<(NodeIndex, Vec<Condition>)> {
    let mut by_node: Vec<(NodeIndex, Vec<Condition>)> = placed.iter().map(|p| (p.index, Vec::new())).collect();
    'condition: for condition in conditions {
        let needed: HashSet<Identifier> = condition.identifiers.iter().copied().collect();
        for (slot, p) in placed.iter().enumerate() {
            if needed.is_subset(&p.leaves) {
                by_node[slot].1.push(condition.clone());
                continue 'condition;
            }
        }
        // covered by nothing smaller than the whole pattern; attach to root.
        by_node.last_mut().expect("placed is never empty").1.push(condition.clone());
    }
    by_node
}

fn to_operator_spec(template: &OperatorTemplate, order: Vec<Identifier>) -> OperatorSpec {
    match template {
        OperatorTemplate::Seq { strict, .. } => OperatorSpec::Seq { order, strict: *strict },
        OperatorTemplate::And => OperatorSpec::And,
    }
}

/// Cascades every leaf into a left-deep binary chain: `((A SEQ B) SEQ C) SEQ D`.
/// Every interior node is a binary SEQ/AND, regardless of how the pattern was
/// authored. Only the pattern's root-level operator kind and leaf order
/// matter, not its original nesting.
pub struct LeftDeepTreeInitializer;

impl GraphInitializer for LeftDeepTreeInitializer {
    fn build(&self, query: &Query) -> Result<PatternQueryGraph, CepError> {
        let mut leaves = flatten_leaves(&query.pattern)?;
        if leaves.is_empty() {
            return Err(CepError::MalformedPattern("pattern has no leaves".into()));
        }
        let top_operator = match &query.pattern {
            PatternExpr::Sub { operator, .. } => operator.clone(),
            PatternExpr::Leaf { .. } => OperatorTemplate::And,
        };

        // For SEQ, the cascade must build events left-to-right in temporal
        // order regardless of how the pattern's children were authored (§4.6).
        if let OperatorTemplate::Seq { order, .. } = &top_operator {
            leaves.sort_by_key(|(_, identifier)| order.iter().position(|id| id == identifier).unwrap_or(usize::MAX));
        }

        let mut graph = PatternQueryGraph::empty();
        let mut next_interior_id: Identifier = -1;
        let mut placed: Vec<Placed> = Vec::new();

        let (first_type, first_id) = leaves[0].clone();
        let first_idx = graph.add_event_node(first_id, first_type, vec![]);
        placed.push(Placed { index: first_idx, leaves: HashSet::from([first_id]) });

        let mut running_idx = first_idx;
        let mut running_leaves: HashSet<Identifier> = HashSet::from([first_id]);

        if leaves.len() == 1 {
            graph.finish(running_idx);
            let grouped = promote_conditions(&placed, &query.conditions);
            apply_conditions(&mut graph, grouped)?;
            return Ok(graph);
        }

        for (event_type, identifier) in leaves.iter().skip(1) {
            let leaf_idx = graph.add_event_node(*identifier, event_type.clone(), vec![]);
            let order = vec![running_idx_identifier(&graph, running_idx), *identifier];
            let spec = to_operator_spec(&top_operator, order);
            let interior = graph.add_condition_node(next_interior_id, spec, vec![], query.window, vec![running_idx, leaf_idx]);
            next_interior_id -= 1;
            running_leaves.insert(*identifier);
            placed.push(Placed { index: interior, leaves: running_leaves.clone() });
            running_idx = interior;
        }

        graph.finish(running_idx);
        let grouped = promote_conditions(&placed, &query.conditions);
        apply_conditions(&mut graph, grouped)?;
        Ok(graph)
    }
}

/// Retrieves the identifier a binary cascade step's left child presents
/// itself as: the leaf's own identifier for the first step, or the interior
/// node's synthetic identifier for every step after.
fn running_idx_identifier(graph: &PatternQueryGraph, idx: NodeIndex) -> Identifier {
    graph.identifier_of(idx)
}

/// Mirrors the pattern's authored nesting directly: each `Sub` becomes one
/// interior node over exactly its declared children.
pub struct NestedTreeInitializer;

impl GraphInitializer for NestedTreeInitializer {
    fn build(&self, query: &Query) -> Result<PatternQueryGraph, CepError> {
        let mut graph = PatternQueryGraph::empty();
        let mut placed: Vec<Placed> = Vec::new();

        let root = build_node(&query.pattern, &mut graph, query.window, &mut placed)?;
        graph.finish(root);

        let grouped = promote_conditions(&placed, &query.conditions);
        apply_conditions(&mut graph, grouped)?;
        Ok(graph)
    }
}

fn build_node(
    expr: &PatternExpr,
    graph: &mut PatternQueryGraph,
    window: crate::event::Timestamp,
    placed: &mut Vec<Placed>,
) -> Result<NodeIndex, CepError> {
    match expr {
        PatternExpr::Leaf { event_type, identifier } => {
            let idx = graph.add_event_node(*identifier, event_type.clone(), vec![]);
            placed.push(Placed { index: idx, leaves: HashSet::from([*identifier]) });
            Ok(idx)
        }
        PatternExpr::Sub { operator, children, identifier } => {
            let mut child_indices = Vec::with_capacity(children.len());
            let mut combined_leaves = HashSet::new();
            for child in children {
                let idx = build_node(child, graph, window, placed)?;
                child_indices.push(idx);
                combined_leaves.extend(child.leaf_identifiers());
            }
            let order = match operator {
                OperatorTemplate::Seq { order, .. } => order.clone(),
                OperatorTemplate::And => Vec::new(),
            };
            let spec = to_operator_spec(operator, order);
            // A sibling's SEQ `order` list may reference this Sub node by its
            // authored identifier, so the node keeps that identifier rather
            // than a freshly synthesized one (unlike LeftDeepTreeInitializer's
            // purely-internal cascade nodes, which no pattern ever addresses).
            let idx = graph.add_condition_node(*identifier, spec, vec![], window, child_indices);
            placed.push(Placed { index: idx, leaves: combined_leaves });
            Ok(idx)
        }
    }
}

fn apply_conditions(graph: &mut PatternQueryGraph, grouped: Vec<(NodeIndex, Vec<Condition>)>) -> Result<(), CepError> {
    for (idx, conditions) in grouped {
        graph.attach_conditions(idx, conditions)?;
    }
    Ok(())
}

fn flatten_leaves(expr: &PatternExpr) -> Result<Vec<(String, Identifier)>, CepError> {
    let mut out = Vec::new();
    flatten_leaves_into(expr, &mut out);
    if out.is_empty() {
        return Err(CepError::MalformedPattern("pattern has no leaves".into()));
    }
    Ok(out)
}

fn flatten_leaves_into(expr: &PatternExpr, out: &mut Vec<(String, Identifier)>) {
    match expr {
        PatternExpr::Leaf { event_type, identifier } => out.push((event_type.clone(), *identifier)),
        PatternExpr::Sub { children, .. } => {
            for child in children {
                flatten_leaves_into(child, out);
            }
        }
    }
}
