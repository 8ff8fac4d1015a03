//! The per-query evaluation graph (§4, §9 Design Notes).
//!
//! `PatternQueryGraph` is the arena-based tree a [`crate::initializer::GraphInitializer`]
//! builds from a [`crate::pattern::Query`]: leaf `EventNode`s accept raw events,
//! interior `ConditionNode`s combine their children's buffered partial results
//! through an [`OperatorSpec`]. Edges point from child to parent, the same
//! orientation the reference distributed-graph module in this codebase uses for
//! its own causal links, so a node's parent is a single `Outgoing` hop away.
//!
//! Propagation is iterative rather than recursive (§9): a work stack carries
//! `(node, freshly produced results)` pairs upward until they either die out
//! (rejected by an operator or a condition) or reach the root, at which point
//! they are complete matches.
//!
//! What happens to a root match depends on the bound [`OutputSink`] (§4.4,
//! §6): with an incremental sink, each root-reaching batch is handed to the
//! sink immediately, within the same `handle_event` call that produced it;
//! with no sink, or a sink whose [`OutputSink::incremental`] is `false`, the
//! batch is appended to the root's own buffer instead, to be read later via
//! [`PatternQueryGraph::results`] or flushed to the sink at end-of-stream via
//! [`PatternQueryGraph::emit_final`].

use std::sync::Arc;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction::Outgoing;

use crate::condition::{check_all, Condition};
use crate::error::CepError;
use crate::event::{Event, Timestamp};
use crate::memory::ResultBuffer;
use crate::operator::OperatorSpec;
use crate::partial_result::PartialResult;
use crate::sink::OutputSink;

/// Identifies a leaf event or a composite node within a single query's
/// component namespace. Leaves use their declared (non-negative) identifier;
/// interior nodes are assigned negative identifiers by the initializer so the
/// two namespaces never collide inside a [`PartialResult`]'s component map.
pub type Identifier = i32;

#[derive(Debug)]
pub struct EventNode {
    pub identifier: Identifier,
    pub event_type: String,
    pub conditions: Vec<Condition>,
    pub buffer: ResultBuffer,
}

#[derive(Debug)]
pub struct ConditionNode {
    pub identifier: Identifier,
    pub operator: OperatorSpec,
    pub conditions: Vec<Condition>,
    pub window: Timestamp,
    pub buffer: ResultBuffer,
    pub children: Vec<NodeIndex>,
}

#[derive(Debug)]
pub enum GraphNode {
    Event(EventNode),
    Condition(ConditionNode),
}

/// A single query's evaluation tree plus the buffers hanging off each node.
pub struct PatternQueryGraph {
    arena: StableDiGraph<GraphNode, ()>,
    root: NodeIndex,
    leaves: Vec<NodeIndex>,
    error_count: u64,
    /// The root's output sink (§3 "ConditionNode ... optional output sink"),
    /// bound once by [`crate::model::EvaluationModel::set_queries`]. `None`
    /// behaves exactly like a bound, non-incremental sink: matches accumulate
    /// in `root_buffer` for later retrieval.
    sink: Option<Box<dyn OutputSink>>,
    /// Matches that reached the root while no incremental sink was ready to
    /// take them immediately. Drained by [`Self::results`] and
    /// [`Self::emit_final`]; reset by [`Self::clear`].
    root_buffer: Vec<Arc<PartialResult>>,
}

impl std::fmt::Debug for PatternQueryGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternQueryGraph")
            .field("root", &self.root)
            .field("leaves", &self.leaves)
            .field("error_count", &self.error_count)
            .field("root_buffer_len", &self.root_buffer.len())
            .finish_non_exhaustive()
    }
}

impl PatternQueryGraph {
    /// Inserts a leaf `EventNode`. Does not wire any edges; the initializer
    /// connects it to a parent via [`Self::add_condition_node`].
    pub fn add_event_node(&mut self, identifier: Identifier, event_type: String, conditions: Vec<Condition>) -> NodeIndex {
        self.arena.add_node(GraphNode::Event(EventNode {
            identifier,
            event_type,
            conditions,
            buffer: ResultBuffer::new(),
        }))
    }

    /// Inserts an interior `ConditionNode` and wires a child -> parent edge
    /// from each of `children` to it.
    pub fn add_condition_node(
        &mut self,
        identifier: Identifier,
        operator: OperatorSpec,
        conditions: Vec<Condition>,
        window: Timestamp,
        children: Vec<NodeIndex>,
    ) -> NodeIndex {
        let idx = self.arena.add_node(GraphNode::Condition(ConditionNode {
            identifier,
            operator,
            conditions,
            window,
            buffer: ResultBuffer::new(),
            children: children.clone(),
        }));
        for child in children {
            self.arena.add_edge(child, idx, ());
        }
        idx
    }

    /// Freshly-built graphs start empty; an initializer calls this once it
    /// has placed every node, to fix the root and compute the leaf set.
    pub fn empty() -> Self {
        Self {
            arena: StableDiGraph::new(),
            root: NodeIndex::end(),
            leaves: Vec::new(),
            error_count: 0,
            sink: None,
            root_buffer: Vec::new(),
        }
    }

    /// Binds the root's output sink (§4.7 "bind each root's output sink").
    pub fn set_sink(&mut self, sink: Box<dyn OutputSink>) {
        self.sink = Some(sink);
    }

    /// The root's buffer, fully unpacked to lists of raw events (§4.7
    /// `results()`), one entry per complete match accumulated since
    /// construction or the last [`Self::clear`]. Only reflects matches that
    /// weren't already handed to an incremental sink as they arrived.
    pub fn results(&self) -> Vec<Vec<Arc<Event>>> {
        self.root_buffer
            .iter()
            .map(|result| {
                let mut events: Vec<Arc<Event>> = result.completely_unpack().into_values().collect();
                events.sort_by_key(|e| e.timestamp());
                events
            })
            .collect()
    }

    /// Flushes `root_buffer` to the bound sink, if any, at end-of-stream
    /// (§4.4's state machine: "at stream end the root's remaining buffer is
    /// emitted by the terminal sink"). A no-op if no sink is bound or the
    /// bound sink is incremental (it already received every match as it
    /// arrived).
    pub fn emit_final(&mut self) -> Result<(), CepError> {
        if self.root_buffer.is_empty() {
            return Ok(());
        }
        if let Some(sink) = self.sink.as_mut() {
            if !sink.incremental() {
                sink.accept(&self.root_buffer)?;
            }
        }
        Ok(())
    }

    /// Number of predicate evaluation failures absorbed since the graph was
    /// built (or last cleared), each one a discarded candidate rather than a
    /// propagated error.
    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    pub fn finish(&mut self, root: NodeIndex) {
        self.root = root;
        self.leaves = self
            .arena
            .node_indices()
            .filter(|&idx| matches!(self.arena[idx], GraphNode::Event(_)))
            .collect();
    }

    /// The component-namespace identifier a node presents to its parent.
    pub fn identifier_of(&self, node: NodeIndex) -> Identifier {
        match &self.arena[node] {
            GraphNode::Event(n) => n.identifier,
            GraphNode::Condition(n) => n.identifier,
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Appends `conditions` to the node at `index`, wherever it sits in the
    /// tree. Used by a [`crate::initializer::GraphInitializer`] once it has
    /// decided, via `promote_conditions`, where each condition belongs.
    pub fn attach_conditions(&mut self, index: NodeIndex, conditions: Vec<Condition>) -> Result<(), crate::error::CepError> {
        if conditions.is_empty() {
            return Ok(());
        }
        match &mut self.arena[index] {
            GraphNode::Event(n) => n.conditions.extend(conditions),
            GraphNode::Condition(n) => n.conditions.extend(conditions),
        }
        Ok(())
    }

    fn parent_of(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.arena.neighbors_directed(node, Outgoing).next()
    }

    fn try_add_event(&mut self, leaf: NodeIndex, event: &Arc<Event>) -> Option<Arc<PartialResult>> {
        let GraphNode::Event(node) = &mut self.arena[leaf] else {
            unreachable!("leaves are always EventNodes")
        };
        if node.event_type != event.type_tag() {
            return None;
        }
        let identifier = node.identifier;
        let candidate = PartialResult::from_event(identifier, event.clone());
        let mut predicate_failed = false;
        let accepted = check_all(&node.conditions, &candidate).unwrap_or_else(|err| {
            tracing::warn!(error = %err, identifier, "leaf condition evaluation failed, treating as rejected");
            predicate_failed = true;
            false
        });
        if predicate_failed {
            self.error_count += 1;
        }
        if !accepted {
            return None;
        }
        let GraphNode::Event(node) = &mut self.arena[leaf] else {
            unreachable!("leaves are always EventNodes")
        };
        let arc = Arc::new(candidate);
        node.buffer.add(arc.clone());
        Some(arc)
    }

    /// Feeds one event through every leaf, then cascades the resulting
    /// partial results upward. Returns every complete match produced at the
    /// root during this call, regardless of whether a sink also received
    /// them (§4.4).
    ///
    /// Each time the cascade reaches the root it is treated as its own
    /// invocation (§4.4's "drain ... after the new insertions in this
    /// invocation"): with a bound incremental sink, that batch is handed to
    /// [`OutputSink::accept`] right there; a sink I/O failure aborts the rest
    /// of this event's cascade and is propagated to the caller, leaving
    /// everything already inserted into non-root buffers untouched (§7).
    /// Without an incremental sink the batch is appended to `root_buffer`
    /// instead, for later retrieval via [`Self::results`] or
    /// [`Self::emit_final`].
    pub fn handle_event(&mut self, event: Arc<Event>) -> Result<Vec<Arc<PartialResult>>, CepError> {
        let mut stack: Vec<(NodeIndex, Vec<Arc<PartialResult>>)> = Vec::new();
        for &leaf in &self.leaves.clone() {
            if let Some(fresh) = self.try_add_event(leaf, &event) {
                stack.push((leaf, vec![fresh]));
            }
        }

        let mut completed = Vec::new();
        let now = event.timestamp();

        while let Some((node, new_results)) = stack.pop() {
            if new_results.is_empty() {
                continue;
            }
            if node == self.root {
                match self.sink.as_mut() {
                    Some(sink) if sink.incremental() => sink.accept(&new_results)?,
                    _ => self.root_buffer.extend(new_results.iter().cloned()),
                }
                completed.extend(new_results);
                continue;
            }
            let Some(parent) = self.parent_of(node) else {
                // a non-root node with no parent is a malformed graph; the
                // initializer is responsible for this never happening.
                continue;
            };
            let (children, window) = match &self.arena[parent] {
                GraphNode::Condition(c) => (c.children.clone(), c.window),
                GraphNode::Event(_) => unreachable!("a node's parent is always a ConditionNode"),
            };

            let mut sibling_buffers = Vec::with_capacity(children.len().saturating_sub(1));
            for &child in &children {
                if child == node {
                    continue;
                }
                let sorted_hint = matches!(self.arena[child], GraphNode::Event(_));
                let pruned = match &mut self.arena[child] {
                    GraphNode::Event(n) => n.buffer.relevant_results(now, window, sorted_hint).to_vec(),
                    GraphNode::Condition(n) => n.buffer.relevant_results(now, window, sorted_hint).to_vec(),
                };
                sibling_buffers.push(pruned);
            }

            let mut parent_new = Vec::new();
            for diffuser in new_results {
                let produced = match &self.arena[parent] {
                    GraphNode::Condition(c) => c.operator.new_results(&sibling_buffers, diffuser, c.identifier),
                    GraphNode::Event(_) => unreachable!(),
                };
                for candidate in produced {
                    let mut predicate_failed = false;
                    let accepted = match &self.arena[parent] {
                        GraphNode::Condition(c) => check_all(&c.conditions, &candidate).unwrap_or_else(|err| {
                            tracing::warn!(error = %err, identifier = c.identifier, "node condition evaluation failed, treating as rejected");
                            predicate_failed = true;
                            false
                        }),
                        GraphNode::Event(_) => unreachable!(),
                    };
                    if predicate_failed {
                        self.error_count += 1;
                    }
                    if !accepted {
                        continue;
                    }
                    let arc = Arc::new(candidate);
                    if parent != self.root {
                        if let GraphNode::Condition(c) = &mut self.arena[parent] {
                            c.buffer.add(arc.clone());
                        }
                    }
                    parent_new.push(arc);
                }
            }
            if !parent_new.is_empty() {
                stack.push((parent, parent_new));
            }
        }

        Ok(completed)
    }

    pub fn clear(&mut self) {
        self.root_buffer.clear();
        for node in self.arena.node_weights_mut() {
            match node {
                GraphNode::Event(n) => n.buffer.clear(),
                GraphNode::Condition(n) => n.buffer.clear(),
            }
        }
        self.error_count = 0;
    }
}

impl Default for PatternQueryGraph {
    fn default() -> Self {
        Self::empty()
    }
}
