//! Per-node partial-result buffer and window pruning (§4.5).
//!
//! Grounded on `original_source/processing_utilities.py`'s `ListWrapper`,
//! with one deliberate correction: the source's sorted-hint scan keeps one
//! stale out-of-window element at the cut boundary (hand-tracing its index
//! arithmetic shows `del self.l[:i]` always retains `l[i]` itself, even when
//! `l[i]` is the element that just failed the window test). Invariant P1
//! (§8) is a hard testable property here, so the scan below drops the whole
//! out-of-window prefix, including the boundary element.

use std::sync::Arc;

use crate::event::Timestamp;
use crate::partial_result::PartialResult;

/// A node's buffer of partial results, pruned at read time.
#[derive(Debug, Default)]
pub struct ResultBuffer {
    items: Vec<Arc<PartialResult>>,
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn add(&mut self, result: Arc<PartialResult>) {
        self.items.push(result);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PartialResult>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drains every buffered result, leaving the buffer empty.
    pub fn pop_all(&mut self) -> Vec<Arc<PartialResult>> {
        std::mem::take(&mut self.items)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Prunes out-of-window results and returns the surviving in-window set.
    ///
    /// `sorted_hint` should be `true` for `EventNode` buffers (timestamps are
    /// monotone in insertion order, since the external sorter guarantees this) and
    /// `false` for `ConditionNode` buffers, where a late cross-product with
    /// older siblings can produce a result with an earlier `start_time` than
    /// one already buffered.
    pub fn relevant_results(&mut self, now: Timestamp, window: Timestamp, sorted_hint: bool) -> &[Arc<PartialResult>] {
        if sorted_hint {
            let stale = self.items.iter().take_while(|p| now - p.start_time > window).count();
            if stale > 0 {
                self.items.drain(0..stale);
            }
        } else {
            self.items.retain(|p| now - p.start_time <= window);
        }
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{next_event_id, Event};
    use crate::schema::EventSchema;
    use crate::value::Value;

    fn schema() -> std::sync::Arc<EventSchema> {
        EventSchema::new(vec!["t".into(), "type".into()], 0, 1)
    }

    fn wrap(t: i64) -> Arc<PartialResult> {
        let event = Arc::new(Event::new(next_event_id(), schema(), vec![Value::Int(t), Value::Str("A".into())]));
        Arc::new(PartialResult::from_event(0, event))
    }

    #[test]
    fn sorted_hint_drops_everything_strictly_out_of_window_including_boundary() {
        let mut buf = ResultBuffer::new();
        for t in [0, 5, 9, 14, 20] {
            buf.add(wrap(t));
        }
        let survivors = buf.relevant_results(20, 10, true);
        // window keeps start_time >= 10: only 14 and 20 qualify. 9 must NOT survive
        // (this is exactly where original_source's off-by-one would have kept it).
        let starts: Vec<_> = survivors.iter().map(|p| p.start_time).collect();
        assert_eq!(starts, vec![14, 20]);
    }

    #[test]
    fn unsorted_hint_filters_without_assuming_order() {
        let mut buf = ResultBuffer::new();
        for t in [20, 0, 14, 5] {
            buf.add(wrap(t));
        }
        let survivors = buf.relevant_results(20, 10, false);
        let mut starts: Vec<_> = survivors.iter().map(|p| p.start_time).collect();
        starts.sort();
        assert_eq!(starts, vec![14, 20]);
    }

    #[test]
    fn pop_all_empties_the_buffer() {
        let mut buf = ResultBuffer::new();
        buf.add(wrap(1));
        buf.add(wrap(2));
        assert_eq!(buf.pop_all().len(), 2);
        assert!(buf.is_empty());
    }
}
