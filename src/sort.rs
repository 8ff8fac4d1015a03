//! External sort of an event file by its timestamp column (§6).
//!
//! A direct port of `original_source/file_sort.py`'s `batch_sort`: split the
//! input into sorted chunks small enough to fit in memory, spill each chunk
//! to a temporary file, then k-way merge the chunks back into the output
//! file. Used ahead of [`crate::source::CsvLineEventSource`] when an input
//! file isn't already time-ordered, since the engine's window pruning
//! assumes a time-ordered stream (§4.5's `sorted_hint`).

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::CepError;

const DEFAULT_CHUNK_LINES: usize = 32_000;

/// Sorts `input_path` by the integer value of its `time_attribute_index`-th
/// comma-separated column, writing the result to `output_path`.
pub fn sort_file(time_attribute_index: usize, input_path: &Path, output_path: &Path) -> Result<(), CepError> {
    sort_file_with_chunk_size(time_attribute_index, input_path, output_path, DEFAULT_CHUNK_LINES)
}

pub fn sort_file_with_chunk_size(
    time_attribute_index: usize,
    input_path: &Path,
    output_path: &Path,
    chunk_lines: usize,
) -> Result<(), CepError> {
    let key_of = |line: &str| -> i64 {
        line.split(',')
            .nth(time_attribute_index)
            .and_then(|token| token.trim().parse().ok())
            .unwrap_or(0)
    };

    let input = File::open(input_path).map_err(CepError::Sink)?;
    let mut lines = BufReader::new(input).lines();

    let mut chunks: Vec<NamedTempFile> = Vec::new();
    loop {
        let mut batch = Vec::with_capacity(chunk_lines);
        for line in (&mut lines).take(chunk_lines) {
            let line = line.map_err(CepError::Sink)?;
            if !line.is_empty() {
                batch.push(line);
            }
        }
        if batch.is_empty() {
            break;
        }
        batch.sort_by_key(|line| key_of(line));

        let chunk = NamedTempFile::new().map_err(CepError::Sink)?;
        {
            let mut writer = BufWriter::new(chunk.reopen().map_err(CepError::Sink)?);
            for line in &batch {
                writeln!(writer, "{line}").map_err(CepError::Sink)?;
            }
            writer.flush().map_err(CepError::Sink)?;
        }
        chunks.push(chunk);
    }

    merge_chunks(&chunks, output_path, key_of)
}

/// One chunk's read cursor during the k-way merge: the next unread line, if
/// any, plus the reader it came from.
struct ChunkCursor {
    key: i64,
    line: String,
    reader: BufReader<File>,
}

impl PartialEq for ChunkCursor {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for ChunkCursor {}
impl PartialOrd for ChunkCursor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ChunkCursor {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

fn merge_chunks(chunks: &[NamedTempFile], output_path: &Path, key_of: impl Fn(&str) -> i64) -> Result<(), CepError> {
    let mut heap: BinaryHeap<Reverse<ChunkCursor>> = BinaryHeap::new();
    for chunk in chunks {
        let file = chunk.reopen().map_err(CepError::Sink)?;
        let mut reader = BufReader::new(file);
        if let Some(line) = read_line(&mut reader)? {
            let key = key_of(&line);
            heap.push(Reverse(ChunkCursor { key, line, reader }));
        }
    }

    let output = File::create(output_path).map_err(CepError::Sink)?;
    let mut writer = BufWriter::new(output);

    while let Some(Reverse(mut cursor)) = heap.pop() {
        writeln!(writer, "{}", cursor.line).map_err(CepError::Sink)?;
        if let Some(next_line) = read_line(&mut cursor.reader)? {
            let key = key_of(&next_line);
            heap.push(Reverse(ChunkCursor { key, line: next_line, reader: cursor.reader }));
        }
    }
    writer.flush().map_err(CepError::Sink)?;
    Ok(())
}

fn read_line(reader: &mut BufReader<File>) -> Result<Option<String>, CepError> {
    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line).map_err(CepError::Sink)?;
    if bytes_read == 0 {
        return Ok(None);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn sorts_a_file_larger_than_one_chunk() {
        let mut input = NamedTempFile::new().unwrap();
        for t in (0..50).rev() {
            writeln!(input, "{t},A,{t}").unwrap();
        }
        input.flush().unwrap();

        let output = NamedTempFile::new().unwrap();
        sort_file_with_chunk_size(0, input.path(), output.path(), 7).unwrap();

        let mut contents = String::new();
        File::open(output.path()).unwrap().read_to_string(&mut contents).unwrap();
        let times: Vec<i64> = contents.lines().map(|l| l.split(',').next().unwrap().parse().unwrap()).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
        assert_eq!(times.len(), 50);
    }

    #[test]
    fn empty_input_produces_empty_output() {
        let input = NamedTempFile::new().unwrap();
        let output = NamedTempFile::new().unwrap();
        sort_file(0, input.path(), output.path()).unwrap();
        let mut contents = String::new();
        File::open(output.path()).unwrap().read_to_string(&mut contents).unwrap();
        assert!(contents.is_empty());
    }
}
