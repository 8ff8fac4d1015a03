//! Property-based checks for P1 (window bound) and P2 (no duplicate events),
//! quantified over randomly generated time-ordered streams (§8).

use std::collections::HashSet;
use std::sync::Arc;

use proptest::collection::vec;
use proptest::prelude::*;

use patternflow::event::{next_event_id, Event};
use patternflow::pattern::{OperatorTemplate, PatternExpr, Query};
use patternflow::schema::EventSchema;
use patternflow::sink::{InMemorySink, OutputSink};
use patternflow::value::Value;
use patternflow::EvaluationModel;

fn schema() -> Arc<EventSchema> {
    EventSchema::new(vec!["time".into(), "type".into()], 0, 1)
}

/// Builds a strictly non-decreasing timestamp stream of A/B-typed events from
/// a sequence of (gap, is_b) pairs, matching the engine's precondition that
/// input is already time-sorted (§5).
fn build_stream(gaps_and_types: Vec<(u8, bool)>) -> Vec<Arc<Event>> {
    let mut t: i64 = 0;
    let mut out = Vec::with_capacity(gaps_and_types.len());
    for (gap, is_b) in gaps_and_types {
        t += gap as i64;
        let ty = if is_b { "B" } else { "A" };
        out.push(Arc::new(Event::new(next_event_id(), schema(), vec![Value::Int(t), Value::Str(ty.into())])));
    }
    out
}

fn seq_ab_query(window: i64) -> Query {
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

proptest! {
    /// P1: every produced match's span never exceeds the query's window.
    #[test]
    fn window_bound_holds_for_every_match(
        gaps_and_types in vec((0u8..6, any::<bool>()), 0..40),
        window in 1i64..30,
    ) {
        let stream = build_stream(gaps_and_types);
        let mut model = EvaluationModel::new();
        model.set_queries(&[seq_ab_query(window)], vec![None]).unwrap();

        let mut sink = InMemorySink::new();
        for event in stream {
            for (_, matches) in model.handle_event(event).unwrap() {
                sink.accept(&matches).unwrap();
            }
        }

        for result in sink.results() {
            prop_assert!(result.end_time - result.start_time <= window);
        }
    }

    /// P2: every match's constituent events are pairwise distinct by identity.
    #[test]
    fn no_match_reuses_one_event_for_two_identifiers(
        gaps_and_types in vec((0u8..6, any::<bool>()), 0..40),
        window in 1i64..30,
    ) {
        let stream = build_stream(gaps_and_types);
        let mut model = EvaluationModel::new();
        model.set_queries(&[seq_ab_query(window)], vec![None]).unwrap();

        let mut sink = InMemorySink::new();
        for event in stream {
            for (_, matches) in model.handle_event(event).unwrap() {
                sink.accept(&matches).unwrap();
            }
        }

        for result in sink.results() {
            let ids: Vec<_> = result.event_ids();
            let unique: HashSet<_> = ids.iter().collect();
            prop_assert_eq!(ids.len(), unique.len());
        }
    }

    /// P7: after clear(), results() returns empty for every query, no matter
    /// what was buffered beforehand.
    #[test]
    fn clear_empties_results_regardless_of_prior_stream(
        gaps_and_types in vec((0u8..6, any::<bool>()), 0..40),
        window in 1i64..30,
    ) {
        let stream = build_stream(gaps_and_types);
        let mut model = EvaluationModel::new();
        model.set_queries(&[seq_ab_query(window)], vec![None]).unwrap();

        for event in stream {
            model.handle_event(event).unwrap();
        }

        model.clear();
        for per_query in model.results() {
            prop_assert!(per_query.is_empty());
        }
    }
}
