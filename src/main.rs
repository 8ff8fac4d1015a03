//! Demo entrypoint: runs one hardcoded pattern query over a CSV event log.
//!
//! Wires the external sorter, the CSV event source, the evaluation model, and
//! an output sink together exactly as a caller would: sort the input by its
//! timestamp column, stream events through one registered query, and print
//! every complete match as it is produced.
//!
//! Usage: `patternflow <input.csv> [window]`. The input file's columns are
//! `time,type,volume`; the demo query is `SEQ(A, B)` with `A.volume >
//! B.volume`, matching scenario 2 of the evaluation engine's test suite.

use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use patternflow::condition::Condition;
use patternflow::error::CepError;
use patternflow::pattern::{OperatorTemplate, PatternExpr, Query};
use patternflow::schema::EventSchema;
use patternflow::sink::InMemorySink;
use patternflow::source::{CsvLineEventSource, EventSource};
use patternflow::value::Value;
use patternflow::EvaluationModel;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let input_path: PathBuf = args.next().context("usage: patternflow <input.csv> [window]")?.into();
    let window: i64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(100);

    let schema = EventSchema::new(vec!["time".into(), "type".into(), "volume".into()], 0, 1);

    let sorted = tempfile::NamedTempFile::new().context("allocating sort scratch file")?;
    patternflow::sort::sort_file(0, &input_path, sorted.path())?;

    let volume_index = schema.require_index("volume")?;
    let condition = Condition::new(vec![0, 1], move |events| {
        let a = events[0]
            .attr_at(volume_index)
            .as_i64()
            .ok_or(CepError::TypeMismatch { identifier: 0, expected: "int" })?;
        let b = events[1]
            .attr_at(volume_index)
            .as_i64()
            .ok_or(CepError::TypeMismatch { identifier: 1, expected: "int" })?;
        Ok(a > b)
    });

    let query = Query {
        pattern: PatternExpr::Sub {
            operator: OperatorTemplate::Seq { order: vec![0, 1], strict: false },
            children: vec![
                PatternExpr::Leaf { event_type: "A".into(), identifier: 0 },
                PatternExpr::Leaf { event_type: "B".into(), identifier: 1 },
            ],
            identifier: -1,
        },
        conditions: vec![condition],
        window,
        fixed_count_window: false,
    };

    let mut model = EvaluationModel::new();
    model.set_queries(std::slice::from_ref(&query), vec![Some(Box::new(InMemorySink::new()))])?;

    let mut source = CsvLineEventSource::new(BufReader::new(std::fs::File::open(sorted.path())?), schema);

    let mut count = 0usize;
    while let Some(event) = source.next_event()? {
        for (_query_index, matches) in model.handle_event(event)? {
            count += matches.len();
        }
    }
    model.emit_final()?;

    tracing::info!(matches = count, "stream exhausted");
    for query_results in model.results() {
        for events in query_results {
            let line = events.iter().map(|e| e.display_line()).collect::<Vec<_>>().join(" | ");
            println!("{line}");
        }
    }

    Ok(())
}
