// src/process/filter.rs

use serde::Serialize;
use tracing::{debug, trace};

use super::{
    chunk::{RawBatch, RawBatchSource},
    parser::RecordParser,
    utils::{split_line, strip_terminator},
};
use crate::{
    query::QuerySet,
    schema::{FieldIndex, Record},
    Result,
};

/// Records produced by one fill, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChunkBatch {
    records: Vec<Record>,
}

impl ChunkBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn to_json(&self, header: &FieldIndex) -> Vec<serde_json::Value> {
        self.records.iter().map(|r| r.to_json(header)).collect()
    }
}

impl From<Vec<Record>> for ChunkBatch {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl IntoIterator for ChunkBatch {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChunkBatch {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Produces the next batch of records, dropping non-matching lines before the
/// full parse.
///
/// The pre-filter splits each raw line on the column separator without honoring
/// quotes. By default a line whose fields cannot be compared (missing column,
/// wrong type) is treated as a non-match; with `strict` the error is returned.
pub struct FilteringChunkParser {
    lines: Box<dyn RawBatchSource>,
    parser: RecordParser,
    strict: bool,
}

impl FilteringChunkParser {
    pub fn new(lines: Box<dyn RawBatchSource>, parser: RecordParser, strict: bool) -> Self {
        Self {
            lines,
            parser,
            strict,
        }
    }

    pub fn parser(&self) -> &RecordParser {
        &self.parser
    }

    pub fn is_exhausted(&self) -> bool {
        self.lines.is_exhausted()
    }

    /// Swap the line source, returning the old one so the caller controls when it drops.
    pub fn replace_lines(&mut self, lines: Box<dyn RawBatchSource>) -> Box<dyn RawBatchSource> {
        std::mem::replace(&mut self.lines, lines)
    }

    /// Pull raw lines straight from the source, bypassing the filter.
    pub fn raw(&mut self, max_lines: usize) -> Result<RawBatch> {
        self.lines.refill(max_lines)
    }

    /// Next batch for `query`.
    ///
    /// With no filters this is one refill of `target` lines. With filters it keeps
    /// refilling until at least `target` lines were accepted or the source runs
    /// dry, so a batch may exceed `target` by up to one refill's worth.
    pub fn fill(&mut self, query: &QuerySet, target: usize) -> Result<ChunkBatch> {
        let target = target.max(1);

        if query.is_empty() {
            let raw = self.lines.refill(target)?;
            let records = self.parser.parse_batch(&raw)?;
            trace!(lines = raw.len(), records = records.len(), "unfiltered fill");
            return Ok(ChunkBatch::from(records));
        }

        let options = self.parser.options().clone();
        let mut accepted = RawBatch::with_capacity(target);
        let mut scanned = 0usize;
        let mut rejected_on_error = 0usize;

        while accepted.len() < target && !self.lines.is_exhausted() {
            let raw = self.lines.refill(target)?;
            if raw.is_empty() {
                break;
            }
            for line in raw.into_lines() {
                scanned += 1;
                if strip_terminator(&line, &options).is_empty() {
                    continue;
                }
                let fields = split_line(&line, &options);
                let keep = match query.evaluate(&fields, &options) {
                    Ok(hit) => hit,
                    Err(e) if !self.strict && e.is_row_level() => {
                        rejected_on_error += 1;
                        trace!(error = %e, "pre-filter rejected line");
                        false
                    }
                    Err(e) => return Err(e),
                };
                if keep {
                    accepted.push(line);
                }
            }
        }

        let records = self.parser.parse_batch(&accepted)?;
        debug!(
            scanned,
            accepted = accepted.len(),
            rejected_on_error,
            exhausted = self.lines.is_exhausted(),
            "filtered fill"
        );
        Ok(ChunkBatch::from(records))
    }
}
