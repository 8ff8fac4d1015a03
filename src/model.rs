//! Multi-query orchestration (§5).
//!
//! `EvaluationModel` owns one [`PatternQueryGraph`] per registered query and
//! fans each incoming event out to all of them, exactly mirroring
//! `original_source/processor.py`'s per-pattern dispatch loop. Fixed-count
//! window queries (§4.7) get their own private ordinal clock: events handed
//! to such a query have their timestamp rewritten before entering its graph,
//! leaving the event's place in every other query's time-ordered stream
//! untouched.

use std::sync::Arc;

use crate::error::CepError;
use crate::event::Event;
use crate::graph::PatternQueryGraph;
use crate::initializer::{GraphInitializer, LeftDeepTreeInitializer};
use crate::partial_result::PartialResult;
use crate::pattern::{validate_pattern, Query};
use crate::sink::OutputSink;

struct RegisteredQuery {
    graph: PatternQueryGraph,
    fixed_count_window: bool,
    step_counter: i64,
}

/// Evaluates a set of pattern queries against a shared event stream.
pub struct EvaluationModel {
    queries: Vec<RegisteredQuery>,
}

impl EvaluationModel {
    pub fn new() -> Self {
        Self { queries: Vec::new() }
    }

    /// Validates and builds a graph for each query, replacing any previously
    /// registered set, and binds each root's output sink (§4.7 "set_queries
    /// (queries, sinks): build one PatternQueryGraph per query ... bind each
    /// root's output sink"). `sinks` must have one entry per query, in the
    /// same order; pass `None` for a query that has nowhere to send its
    /// matches other than [`PatternQueryGraph::results`]. Uses
    /// [`LeftDeepTreeInitializer`] as the default strategy; callers wanting
    /// the pattern's authored shape preserved in the graph should build with
    /// [`crate::initializer::NestedTreeInitializer`] directly and register
    /// via [`Self::set_graphs`] instead.
    ///
    /// A malformed query is logged and dropped rather than aborting the
    /// whole batch; every other query in `queries` still gets built and
    /// registered. Returns the first error encountered, if any, so a caller
    /// can tell the batch wasn't fully accepted even though it was fully
    /// processed.
    pub fn set_queries(&mut self, queries: &[Query], sinks: Vec<Option<Box<dyn OutputSink>>>) -> Result<(), CepError> {
        if sinks.len() != queries.len() {
            return Err(CepError::MalformedPattern(format!(
                "set_queries received {} queries but {} sinks",
                queries.len(),
                sinks.len()
            )));
        }
        let mut built = Vec::with_capacity(queries.len());
        let mut first_error = None;
        for (query, sink) in queries.iter().zip(sinks) {
            let outcome = validate_pattern(query).and_then(|()| LeftDeepTreeInitializer.build(query));
            match outcome {
                Ok(mut graph) => {
                    if let Some(sink) = sink {
                        graph.set_sink(sink);
                    }
                    built.push(RegisteredQuery {
                        graph,
                        fixed_count_window: query.fixed_count_window,
                        step_counter: 0,
                    });
                }
                Err(err) => {
                    tracing::warn!(error = %err, "rejecting malformed query, continuing with the rest of the batch");
                    first_error.get_or_insert(err);
                }
            }
        }
        self.queries = built;
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Registers already-built graphs directly, bypassing the default
    /// initializer. Used when a caller needs `NestedTreeInitializer` or a
    /// hand-built graph; bind a sink beforehand via
    /// [`PatternQueryGraph::set_sink`] if one is wanted.
    pub fn set_graphs(&mut self, graphs: Vec<(PatternQueryGraph, bool)>) {
        self.queries = graphs
            .into_iter()
            .map(|(graph, fixed_count_window)| RegisteredQuery { graph, fixed_count_window, step_counter: 0 })
            .collect();
    }

    /// Feeds one event to every registered query, returning the complete
    /// matches produced this step, grouped by the index of the query that
    /// produced them (matching `queries`' registration order). Propagates
    /// the first sink I/O failure encountered (§7): the query whose
    /// incremental sink failed aborts its own cascade for this event, but
    /// every other query was already fed before the error surfaced.
    pub fn handle_event(&mut self, event: Arc<Event>) -> Result<Vec<(usize, Vec<Arc<PartialResult>>)>, CepError> {
        let mut out = Vec::new();
        for (idx, registered) in self.queries.iter_mut().enumerate() {
            let fed = if registered.fixed_count_window {
                registered.step_counter += 1;
                Arc::new(event.with_timestamp(registered.step_counter))
            } else {
                event.clone()
            };
            let matches = registered.graph.handle_event(fed)?;
            if !matches.is_empty() {
                out.push((idx, matches));
            }
        }
        Ok(out)
    }

    /// For each registered query, the root's buffer fully unpacked to lists
    /// of raw events (§4.7 `results()`), indexed by registration order.
    /// Reflects only matches that weren't already handed to an incremental
    /// sink as they arrived.
    pub fn results(&self) -> Vec<Vec<Vec<Arc<Event>>>> {
        self.queries.iter().map(|registered| registered.graph.results()).collect()
    }

    /// Flushes every query's accumulated root buffer to its bound sink, if
    /// any (§4.4: "at stream end the root's remaining buffer is emitted by
    /// the terminal sink"). Called once, after the event stream is
    /// exhausted; a no-op for queries with no sink or an incremental one.
    pub fn emit_final(&mut self) -> Result<(), CepError> {
        for registered in &mut self.queries {
            registered.graph.emit_final()?;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        for registered in &mut self.queries {
            registered.graph.clear();
            registered.step_counter = 0;
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.len()
    }
}

impl Default for EvaluationModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::next_event_id;
    use crate::pattern::{OperatorTemplate, PatternExpr};
    use crate::schema::EventSchema;
    use crate::value::Value;

    fn schema() -> Arc<EventSchema> {
        EventSchema::new(vec!["t".into(), "type".into()], 0, 1)
    }

    fn event(t: i64, ty: &str) -> Arc<Event> {
        Arc::new(Event::new(next_event_id(), schema(), vec![Value::Int(t), Value::Str(ty.into())]))
    }

    fn seq_ab(window: i64) -> Query {
        Query {
            pattern: PatternExpr::Sub {
                operator: OperatorTemplate::Seq { order: vec![0, 1], strict: false },
                children: vec![
                    PatternExpr::Leaf { event_type: "A".into(), identifier: 0 },
                    PatternExpr::Leaf { event_type: "B".into(), identifier: 1 },
                ],
                identifier: -1,
            },
            conditions: vec![],
            window,
            fixed_count_window: false,
        }
    }

    fn no_sinks(n: usize) -> Vec<Option<Box<dyn OutputSink>>> {
        (0..n).map(|_| None).collect()
    }

    #[test]
    fn dispatches_to_every_registered_query() {
        let mut model = EvaluationModel::new();
        model.set_queries(&[seq_ab(10), seq_ab(10)], no_sinks(2)).unwrap();
        model.handle_event(event(1, "A")).unwrap();
        let produced = model.handle_event(event(2, "B")).unwrap();
        assert_eq!(produced.len(), 2);
        assert_eq!(produced[0].0, 0);
        assert_eq!(produced[1].0, 1);
    }

    #[test]
    fn clear_resets_all_graphs_and_counters() {
        let mut model = EvaluationModel::new();
        model.set_queries(&[seq_ab(10)], no_sinks(1)).unwrap();
        model.handle_event(event(1, "A")).unwrap();
        model.clear();
        assert!(model.handle_event(event(2, "B")).unwrap().is_empty());
    }

    #[test]
    fn invalid_query_is_rejected_before_any_graph_is_built() {
        let mut model = EvaluationModel::new();
        let mut bad = seq_ab(10);
        bad.conditions.push(crate::condition::Condition::new(vec![99], |_| Ok(true)));
        assert!(model.set_queries(&[bad], no_sinks(1)).is_err());
        assert_eq!(model.query_count(), 0);
    }

    #[test]
    fn one_malformed_query_does_not_block_the_rest_of_the_batch() {
        let mut model = EvaluationModel::new();
        let mut bad = seq_ab(10);
        bad.conditions.push(crate::condition::Condition::new(vec![99], |_| Ok(true)));
        let good = seq_ab(10);
        assert!(model.set_queries(&[bad, good], no_sinks(2)).is_err());
        assert_eq!(model.query_count(), 1);
        model.handle_event(event(1, "A")).unwrap();
        let produced = model.handle_event(event(2, "B")).unwrap();
        assert_eq!(produced.len(), 1);
    }

    #[test]
    fn mismatched_sink_count_is_rejected() {
        let mut model = EvaluationModel::new();
        assert!(model.set_queries(&[seq_ab(10), seq_ab(10)], no_sinks(1)).is_err());
    }

    #[test]
    fn results_accumulate_without_a_bound_sink_and_clear_after_clear() {
        let mut model = EvaluationModel::new();
        model.set_queries(&[seq_ab(10)], no_sinks(1)).unwrap();
        model.handle_event(event(1, "A")).unwrap();
        model.handle_event(event(2, "B")).unwrap();

        let results = model.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].len(), 1, "one complete SEQ(A,B) match");

        model.clear();
        // P7: after clear(), results() returns empty for every query.
        assert!(model.results().iter().all(|per_query| per_query.is_empty()));
    }
}
