//! Output sinks (§6): where complete matches go once a query produces them.
//!
//! Grounded on `original_source/processing_utilities.py`'s `OutputInterface`
//! hierarchy: `TrivialOutputInterface` (collect, return in full only once the
//! stream ends) becomes [`InMemorySink`], and `FileOutputInterface`
//! (append-as-you-go, `" ###result### "` / `" ### "` framing) becomes
//! [`FileAppendSink`]. `output_while_running` becomes [`OutputSink::incremental`].

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::CepError;
use crate::event::Event;
use crate::partial_result::PartialResult;

/// Where a query's complete matches are delivered.
pub trait OutputSink {
    fn accept(&mut self, matches: &[Arc<PartialResult>]) -> Result<(), CepError>;

    /// `true` if this sink can usefully receive partial batches while the
    /// stream is still being processed, rather than only once at the end.
    fn incremental(&self) -> bool;
}

/// Buffers every match in memory; nothing is written until the caller reads
/// [`Self::results`].
#[derive(Debug, Default)]
pub struct InMemorySink {
    results: Vec<Arc<PartialResult>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> &[Arc<PartialResult>] {
        &self.results
    }

    pub fn into_results(self) -> Vec<Arc<PartialResult>> {
        self.results
    }
}

impl OutputSink for InMemorySink {
    fn accept(&mut self, matches: &[Arc<PartialResult>]) -> Result<(), CepError> {
        self.results.extend(matches.iter().cloned());
        Ok(())
    }

    fn incremental(&self) -> bool {
        false
    }
}

/// Appends each batch of matches to a file, one `" ###result### " ... " ### "`
/// block per match, truncating the file on the first write of a run.
pub struct FileAppendSink {
    path: PathBuf,
    first_call: bool,
}

impl FileAppendSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), first_call: true }
    }

    fn open(&mut self) -> Result<File, CepError> {
        let file = if self.first_call {
            OpenOptions::new().write(true).create(true).truncate(true).open(&self.path)
        } else {
            OpenOptions::new().append(true).create(true).open(&self.path)
        };
        self.first_call = false;
        file.map_err(CepError::Sink)
    }
}

impl OutputSink for FileAppendSink {
    fn accept(&mut self, matches: &[Arc<PartialResult>]) -> Result<(), CepError> {
        let mut file = self.open()?;
        for result in matches {
            write!(file, "{}", format_result(result)).map_err(CepError::Sink)?;
        }
        Ok(())
    }

    fn incremental(&self) -> bool {
        true
    }
}

fn format_result(result: &PartialResult) -> String {
    let mut out = String::from(" ###result### \n");
    for event in result.completely_unpack().values() {
        out.push_str(&event_line(event));
        out.push('\n');
    }
    out.push_str(" ### ");
    out
}

fn event_line(event: &Arc<Event>) -> String {
    event.display_line()
}
