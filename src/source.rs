//! Event sources (§6): turning a raw line stream into schema-backed `Event`s.
//!
//! Grounded on `original_source/processing_utilities.py`'s CSV event reader:
//! comma-split a line, coerce each token with [`crate::value::Value::parse`],
//! and stamp the row with a fresh [`EventId`] in read order.

use std::io::BufRead;
use std::sync::Arc;

use crate::error::CepError;
use crate::event::{next_event_id, Event};
use crate::schema::EventSchema;
use crate::value::Value;

/// Produces events, one at a time, from some underlying stream.
pub trait EventSource {
    /// Returns the next event, or `None` once the source is exhausted.
    fn next_event(&mut self) -> Result<Option<Arc<Event>>, CepError>;
}

/// Reads comma-separated lines from any `BufRead`, coercing each field with
/// [`Value::parse`] against a fixed [`EventSchema`].
pub struct CsvLineEventSource<R> {
    reader: R,
    schema: Arc<EventSchema>,
}

impl<R: BufRead> CsvLineEventSource<R> {
    pub fn new(reader: R, schema: Arc<EventSchema>) -> Self {
        Self { reader, schema }
    }
}

impl<R: BufRead> EventSource for CsvLineEventSource<R> {
    fn next_event(&mut self) -> Result<Option<Arc<Event>>, CepError> {
        let mut line = String::new();
        let bytes_read = self.reader.read_line(&mut line).map_err(CepError::Sink)?;
        if bytes_read == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            return self.next_event();
        }
        let values: Vec<Value> = trimmed.split(',').map(Value::parse).collect();
        if values.len() != self.schema.attribute_names.len() {
            return Err(CepError::MalformedPattern(format!(
                "event line has {} fields, schema expects {}",
                values.len(),
                self.schema.attribute_names.len()
            )));
        }
        Ok(Some(Arc::new(Event::new(next_event_id(), self.schema.clone(), values))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn schema() -> Arc<EventSchema> {
        EventSchema::new(vec!["time".into(), "type".into(), "volume".into()], 0, 1)
    }

    #[test]
    fn reads_and_coerces_each_line() {
        let data = "1,A,100\n2,B,200.5\n";
        let mut source = CsvLineEventSource::new(Cursor::new(data), schema());
        let first = source.next_event().unwrap().unwrap();
        assert_eq!(first.timestamp(), 1);
        assert_eq!(first.type_tag(), "A");
        let second = source.next_event().unwrap().unwrap();
        assert_eq!(second.attr("volume").and_then(Value::as_f64), Some(200.5));
        assert!(source.next_event().unwrap().is_none());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let data = "1,A,1\n\n2,B,2\n";
        let mut source = CsvLineEventSource::new(Cursor::new(data), schema());
        assert!(source.next_event().unwrap().is_some());
        assert!(source.next_event().unwrap().is_some());
        assert!(source.next_event().unwrap().is_none());
    }

    #[test]
    fn field_count_mismatch_is_an_error() {
        let data = "1,A\n";
        let mut source = CsvLineEventSource::new(Cursor::new(data), schema());
        assert!(source.next_event().is_err());
    }
}
