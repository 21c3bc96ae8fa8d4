// src/cursor/mod.rs
pub mod iter;

use std::{
    collections::{BTreeMap, VecDeque},
    path::Path,
};
use tracing::{debug, warn};

use crate::{
    config::{HeaderOption, ReaderOptions},
    process::{
        ChunkBatch, ChunkBuffer, FilteringChunkParser, Prefetcher, RawBatchSource, RecordParser,
    },
    query::{FilterSpec, Predicate, QuerySet},
    schema::{ColumnKey, FieldIndex, Record},
    source::{FileSource, MemorySource, Source},
    Error, Result,
};

pub use iter::{Batches, Records};

/// Where the cursor stands between calls to [`Cursor::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing buffered; the next advance fills.
    Empty,
    /// At least one parsed record is buffered.
    Ready,
    /// Source drained. Only `reset` leaves this state.
    Exhausted,
}

#[derive(Debug)]
struct CursorState {
    line_count: u64,
    current: Option<Record>,
    pending: VecDeque<Record>,
    phase: Phase,
}

impl CursorState {
    fn new() -> Self {
        Self {
            line_count: 1,
            current: None,
            pending: VecDeque::new(),
            phase: Phase::Empty,
        }
    }

    fn exhaust(&mut self) {
        self.current = None;
        self.pending.clear();
        self.phase = Phase::Exhausted;
    }
}

/// What [`Cursor::each`] hands to its callback.
#[derive(Debug)]
pub enum Emit<'a> {
    /// One record and the cursor's line count after reaching it.
    Record { record: &'a Record, line: u64 },
    /// A whole fill, when `emit_batches_only` is set.
    Batch(ChunkBatch),
}

/// Forward-only reader over a chunked CSV source with an optional row filter.
///
/// Records are pulled in batches of `chunk_size` lines and handed out one at a
/// time. Filters added between advances apply from the next fill on; records
/// already buffered are not re-checked.
pub struct Cursor {
    source: Box<dyn Source>,
    options: ReaderOptions,
    header: FieldIndex,
    header_from_file: bool,
    query: QuerySet,
    chunks: FilteringChunkParser,
    state: CursorState,
    started: bool,
}

impl Cursor {
    #[tracing::instrument(level = "debug", skip(path, options), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        Self::from_source(FileSource::new(path.as_ref()), options)
    }

    pub fn from_bytes(
        name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
        options: ReaderOptions,
    ) -> Result<Self> {
        Self::from_source(MemorySource::new(name, bytes), options)
    }

    pub fn from_source<S: Source + 'static>(source: S, options: ReaderOptions) -> Result<Self> {
        options.validate()?;
        let source: Box<dyn Source> = Box::new(source);
        let lines = start_lines(source.as_ref(), &options)?;
        let chunks = FilteringChunkParser::new(
            lines,
            RecordParser::new(options.parse_options.clone())?,
            options.strict_types,
        );

        let mut cursor = Self {
            source,
            header: FieldIndex::default(),
            header_from_file: false,
            query: QuerySet::new(),
            chunks,
            state: CursorState::new(),
            started: false,
            options,
        };

        match cursor.options.header.clone() {
            HeaderOption::Detect(false) => {}
            HeaderOption::Detect(true) => {
                cursor.header_from_file = true;
                match cursor.consume_header_line()? {
                    Some(columns) => cursor.header.define(columns.into_fields())?,
                    None => warn!(source = %cursor.file_name(), "no header line, source is empty"),
                }
            }
            HeaderOption::Columns(columns) => cursor.header.define(columns)?,
        }

        debug!(
            source = %cursor.file_name(),
            chunk_size = cursor.options.chunk_size,
            header = ?cursor.header.columns(),
            prefetch = ?cursor.options.prefetch,
            "cursor ready"
        );
        Ok(cursor)
    }

    /// Reads past the first non-blank line and returns it parsed.
    fn consume_header_line(&mut self) -> Result<Option<Record>> {
        loop {
            let raw = self.chunks.raw(1)?;
            if raw.is_empty() {
                return Ok(None);
            }
            if let Some(first) = self.chunks.parser().parse_batch(&raw)?.into_iter().next() {
                return Ok(Some(first));
            }
        }
    }

    /// Move to the next record. `Ok(false)` once the source is drained.
    ///
    /// Any error while filling leaves the cursor `Exhausted`: the lines of the
    /// failed chunk are already consumed, so the scan cannot resume past them.
    /// `reset` starts over.
    pub fn advance(&mut self) -> Result<bool> {
        if self.state.phase == Phase::Exhausted {
            return Ok(false);
        }
        self.started = true;

        if self.state.pending.is_empty() && !self.fill_pending()? {
            return Ok(false);
        }

        self.state.current = self.state.pending.pop_front();
        self.state.line_count += 1;
        self.state.phase = if self.state.pending.is_empty() {
            Phase::Empty
        } else {
            Phase::Ready
        };
        Ok(true)
    }

    /// Refill `pending`, skipping empty fills until records arrive or the source
    /// runs dry. Returns false (and exhausts) in the latter case, or on error.
    fn fill_pending(&mut self) -> Result<bool> {
        loop {
            let batch = match self.chunks.fill(&self.query, self.options.chunk_size) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(source = %self.source.name(), error = %e, "fill failed, cursor exhausted");
                    self.state.exhaust();
                    return Err(e);
                }
            };
            if !batch.is_empty() {
                self.state.pending.extend(batch);
                return Ok(true);
            }
            if self.chunks.is_exhausted() {
                self.state.exhaust();
                return Ok(false);
            }
        }
    }

    /// Everything buffered, or the next whole fill. `None` once exhausted.
    pub fn next_batch(&mut self) -> Result<Option<ChunkBatch>> {
        if self.state.phase == Phase::Exhausted {
            return Ok(None);
        }
        self.started = true;

        if self.state.pending.is_empty() && !self.fill_pending()? {
            return Ok(None);
        }

        let batch = ChunkBatch::from(Vec::from(std::mem::take(&mut self.state.pending)));
        self.state.line_count += batch.len() as u64;
        self.state.current = None;
        self.state.phase = Phase::Empty;
        Ok(Some(batch))
    }

    pub fn records(&mut self) -> Records<'_> {
        Records::new(self)
    }

    pub fn batches(&mut self) -> Batches<'_> {
        Batches::new(self)
    }

    /// Drive the reader to the end, handing each record (or each batch when
    /// `emit_batches_only` is set) to `f`.
    pub fn each<F, E>(&mut self, mut f: F) -> std::result::Result<(), E>
    where
        F: FnMut(Emit<'_>) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        if self.options.emit_batches_only {
            while let Some(batch) = self.next_batch()? {
                f(Emit::Batch(batch))?;
            }
        } else {
            while self.advance()? {
                if let Some(record) = self.state.current.as_ref() {
                    f(Emit::Record {
                        record,
                        line: self.state.line_count,
                    })?;
                }
            }
        }
        Ok(())
    }

    pub fn current(&self) -> Option<&Record> {
        self.state.current.as_ref()
    }

    /// Starts at 1 and grows by one per record handed out.
    pub fn line_count(&self) -> u64 {
        self.state.line_count
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn header(&self) -> &FieldIndex {
        &self.header
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn file_name(&self) -> String {
        self.source.name()
    }

    /// Field of the current record by position or case-insensitive name.
    pub fn get<K: Into<ColumnKey>>(&self, key: K) -> Result<Option<&str>> {
        let index = self.header.resolve(&key.into())?;
        Ok(self.state.current.as_ref().and_then(|r| r.get(index)))
    }

    /// Field of the current record by generated accessor name, e.g. `location_id`.
    pub fn attr(&self, accessor: &str) -> Result<Option<&str>> {
        let index = self.header.accessor(accessor)?;
        Ok(self.state.current.as_ref().and_then(|r| r.get(index)))
    }

    pub fn current_json(&self) -> Option<serde_json::Value> {
        self.state.current.as_ref().map(|r| r.to_json(&self.header))
    }

    /// Set the header by hand. Only once, and only before the first advance.
    pub fn set_header<I, S>(&mut self, columns: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.started {
            return Err(Error::ReadInProgress);
        }
        self.header.define(columns)
    }

    /// Add or replace the filter on one column. Names are resolved now.
    pub fn filter<K: Into<ColumnKey>>(&mut self, key: K, predicate: Predicate) -> Result<&mut Self> {
        self.query.define(&self.header, &key.into(), predicate)?;
        Ok(self)
    }

    /// Filter with a textual expression: `>(integer)1`, `!michelle`, `%jes`, or a literal.
    pub fn filter_expr<K: Into<ColumnKey>>(&mut self, key: K, expr: &str) -> Result<&mut Self> {
        let predicate = Predicate::parse(expr)?;
        self.filter(key, predicate)
    }

    /// Filter on any of several expressions; negations in the list must all hold.
    pub fn filter_any<K, I, S>(&mut self, key: K, exprs: I) -> Result<&mut Self>
    where
        K: Into<ColumnKey>,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let predicate = Predicate::one_of(exprs)?;
        self.filter(key, predicate)
    }

    /// Apply a whole declarative filter map. Nothing changes if any entry is invalid.
    pub fn apply_filters(&mut self, filters: &BTreeMap<String, FilterSpec>) -> Result<&mut Self> {
        let mut next = self.query.clone();
        for (key, spec) in filters {
            let predicate = spec.to_predicate()?;
            next.define(&self.header, &config_key(&self.header, key), predicate)?;
        }
        self.query = next;
        Ok(self)
    }

    pub fn clear_filter(&mut self) -> &mut Self {
        self.query.clear();
        self
    }

    pub fn query(&self) -> &QuerySet {
        &self.query
    }

    /// Strict check of a record against the current filters.
    pub fn matches(&self, record: &Record) -> Result<bool> {
        self.query
            .evaluate_record(record, &self.options.parse_options)
    }

    /// Reopen the source at position zero, keeping the header and filters.
    ///
    /// The old reader is released before the new one is opened. If opening
    /// fails the cursor is left exhausted.
    #[tracing::instrument(level = "debug", skip(self), fields(source = %self.source.name()))]
    pub fn reset(&mut self) -> Result<()> {
        drop(self.chunks.replace_lines(Box::new(ChunkBuffer::closed())));
        self.state = CursorState::new();
        self.state.exhaust();
        self.started = false;

        let lines = start_lines(self.source.as_ref(), &self.options)?;
        drop(self.chunks.replace_lines(lines));
        if self.header_from_file {
            self.consume_header_line()?;
        }
        self.state.phase = Phase::Empty;
        Ok(())
    }
}

/// Config-file keys are names, unless purely numeric and not a header name.
fn config_key(header: &FieldIndex, key: &str) -> ColumnKey {
    match key.parse::<usize>() {
        Ok(index) if header.resolve(&ColumnKey::from(key)).is_err() => ColumnKey::Index(index),
        _ => ColumnKey::from(key),
    }
}

fn start_lines(source: &dyn Source, options: &ReaderOptions) -> Result<Box<dyn RawBatchSource>> {
    let buffer = ChunkBuffer::new(source.open()?, source.name(), &options.parse_options)?;
    Ok(match options.prefetch {
        Some(capacity) => Box::new(Prefetcher::spawn(buffer, options.chunk_size, capacity)?),
        None => Box::new(buffer),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    const MEMBERS: &str =
        "ID,Name,Birth\n1,shania,1998-06-27\n2,jessica,1993-08-19\n3,michelle,1999-10-28\n";

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,csvchunk=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn members(options: ReaderOptions) -> Result<Cursor> {
        Ok(Cursor::from_bytes("members.csv", MEMBERS, options.with_header())?)
    }

    fn collect(cursor: &mut Cursor) -> Result<Vec<Record>> {
        Ok(cursor.records().collect::<crate::Result<Vec<_>>>()?)
    }

    fn ids(records: &[Record]) -> Vec<String> {
        records.iter().map(|r| r[0].to_string()).collect()
    }

    fn numbered(n: usize) -> String {
        let mut text = String::from("n,half,label\n");
        for i in 0..n {
            text.push_str(&format!("{},{},\"row {}\"\n", i, i / 2, i));
        }
        text
    }

    #[test]
    fn header_from_file_is_consumed_and_lowercased() -> Result<()> {
        init_test_logging();
        let mut cursor = members(ReaderOptions::default())?;
        assert_eq!(cursor.header().columns().unwrap(), &["id", "name", "birth"]);
        assert_eq!(cursor.phase(), Phase::Empty);
        assert_eq!(cursor.line_count(), 1);

        let rows = collect(&mut cursor)?;
        assert_eq!(ids(&rows), vec!["1", "2", "3"]);
        assert_eq!(cursor.line_count(), 4);
        assert_eq!(cursor.phase(), Phase::Exhausted);
        Ok(())
    }

    #[test]
    fn explicit_columns_keep_first_line_as_data() -> Result<()> {
        let mut cursor = Cursor::from_bytes(
            "members.csv",
            MEMBERS,
            ReaderOptions::default().with_columns(["a", "b", "c"]),
        )?;
        assert!(cursor.advance()?);
        assert_eq!(cursor.get("A")?, Some("ID"));
        Ok(())
    }

    #[test]
    fn phases_follow_the_buffer() -> Result<()> {
        let mut cursor = members(ReaderOptions::default().with_chunk_size(2))?;
        assert!(cursor.advance()?);
        assert_eq!(cursor.phase(), Phase::Ready);
        assert!(cursor.advance()?);
        assert_eq!(cursor.phase(), Phase::Empty);
        assert!(cursor.advance()?);
        assert!(!cursor.advance()?);
        assert_eq!(cursor.phase(), Phase::Exhausted);
        assert!(cursor.current().is_none());
        Ok(())
    }

    #[test]
    fn exhausted_is_idempotent() -> Result<()> {
        let mut cursor = members(ReaderOptions::default())?;
        while cursor.advance()? {}
        let count = cursor.line_count();
        for _ in 0..3 {
            assert!(!cursor.advance()?);
            assert_eq!(cursor.line_count(), count);
            assert!(cursor.current().is_none());
            assert_eq!(cursor.phase(), Phase::Exhausted);
        }
        assert!(cursor.next_batch()?.is_none());
        Ok(())
    }

    #[test]
    fn unfiltered_output_is_independent_of_chunk_size() -> Result<()> {
        let text = numbered(41);
        let baseline = collect(&mut Cursor::from_bytes(
            "n",
            text.clone(),
            ReaderOptions::default().with_header(),
        )?)?;
        assert_eq!(baseline.len(), 41);
        assert_eq!(&baseline[40][2], "row 40");

        for chunk in [1, 2, 3, 10, 40, 41, 42] {
            let options = ReaderOptions::default().with_header().with_chunk_size(chunk);
            let rows = collect(&mut Cursor::from_bytes("n", text.clone(), options)?)?;
            assert_eq!(rows, baseline, "chunk_size {}", chunk);
        }
        Ok(())
    }

    #[test]
    fn prefetch_yields_the_same_records() -> Result<()> {
        init_test_logging();
        let text = numbered(100);
        let mut inline = Cursor::from_bytes(
            "n",
            text.clone(),
            ReaderOptions::default().with_header().with_chunk_size(7),
        )?;
        let mut options = ReaderOptions::default().with_header().with_chunk_size(7);
        options.prefetch = Some(2);
        let mut ahead = Cursor::from_bytes("n", text, options)?;

        inline.filter_expr("half", ">(integer)10")?;
        ahead.filter_expr("half", ">(integer)10")?;

        let expected = collect(&mut inline)?;
        assert_eq!(expected.len(), 78);
        assert_eq!(collect(&mut ahead)?, expected);

        ahead.reset()?;
        assert_eq!(collect(&mut ahead)?, expected);
        Ok(())
    }

    #[test]
    fn reset_replays_the_same_sequence() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(MEMBERS.as_bytes())?;

        let mut cursor = Cursor::open(tmp.path(), ReaderOptions::default().with_header())?;
        cursor.filter("id", Predicate::numeric_range(1.0, 2.0)?)?;
        let first = collect(&mut cursor)?;
        assert_eq!(ids(&first), vec!["1", "2"]);

        cursor.reset()?;
        assert_eq!(cursor.line_count(), 1);
        assert_eq!(cursor.phase(), Phase::Empty);
        assert_eq!(collect(&mut cursor)?, first);

        cursor.clear_filter().reset()?;
        assert_eq!(collect(&mut cursor)?.len(), 3);
        Ok(())
    }

    #[test]
    fn reset_with_explicit_columns_replays_the_first_line() -> Result<()> {
        let mut cursor = Cursor::from_bytes(
            "members.csv",
            MEMBERS,
            ReaderOptions::default().with_columns(["a", "b", "c"]),
        )?;
        let first = collect(&mut cursor)?;
        assert_eq!(ids(&first), vec!["ID", "1", "2", "3"]);

        cursor.reset()?;
        assert_eq!(cursor.header().columns().unwrap(), &["a", "b", "c"]);
        assert_eq!(collect(&mut cursor)?, first);
        Ok(())
    }

    #[test]
    fn reset_failure_leaves_cursor_exhausted() -> Result<()> {
        let tmp = NamedTempFile::new()?;
        std::fs::write(tmp.path(), MEMBERS)?;
        let path = tmp.path().to_path_buf();
        let mut cursor = Cursor::open(&path, ReaderOptions::default().with_header())?;
        assert!(cursor.advance()?);

        tmp.close()?;
        let err = cursor.reset().unwrap_err();
        assert!(matches!(err, Error::SourceIo { .. }));
        assert_eq!(cursor.phase(), Phase::Exhausted);
        assert!(!cursor.advance()?);
        Ok(())
    }

    #[test]
    fn member_filters() -> Result<()> {
        let mut cursor = members(ReaderOptions::default())?;
        cursor.filter("name", Predicate::equals("michelle"))?;
        assert_eq!(
            collect(&mut cursor)?,
            vec![Record::from(vec!["3", "michelle", "1999-10-28"])]
        );

        let mut cursor = members(ReaderOptions::default())?;
        cursor.filter_any("name", ["!shania", "!jessica"])?;
        assert_eq!(ids(&collect(&mut cursor)?), vec!["3"]);

        let mut cursor = members(ReaderOptions::default())?;
        cursor.filter("id", Predicate::numeric_range(1.0, 2.0)?)?;
        assert_eq!(ids(&collect(&mut cursor)?), vec!["1", "2"]);

        let mut cursor = members(ReaderOptions::default())?;
        cursor.filter_expr("NAME", "%jes")?;
        assert_eq!(ids(&collect(&mut cursor)?), vec!["2"]);

        let mut cursor = members(ReaderOptions::default())?;
        cursor
            .filter_expr("birth", "<(date)01-01-1999")?
            .filter_expr("id", ">(integer)1")?;
        assert_eq!(ids(&collect(&mut cursor)?), vec!["2"]);
        Ok(())
    }

    #[test]
    fn filter_added_mid_scan_applies_to_later_chunks_only() -> Result<()> {
        let text = "id,v\n1,a\n2,b\n3,c\n4,d\n";
        let mut cursor = Cursor::from_bytes(
            "mid",
            text,
            ReaderOptions::default().with_header().with_chunk_size(2),
        )?;
        assert!(cursor.advance()?);
        assert_eq!(cursor.get("id")?, Some("1"));

        // record 2 is already buffered and is handed out unfiltered
        cursor.filter_expr("id", "4")?;
        let rest = collect(&mut cursor)?;
        assert_eq!(
            rest,
            vec![Record::from(vec!["2", "b"]), Record::from(vec!["4", "d"])]
        );
        Ok(())
    }

    #[test]
    fn stray_quote_in_a_value_does_not_hide_later_rows() -> Result<()> {
        let text = "id,name\n1,5\" screen\n2,abc\n3,def\n";

        let mut all = Cursor::from_bytes("q", text, ReaderOptions::default().with_header())?;
        let rows = collect(&mut all)?;
        assert_eq!(ids(&rows), vec!["1", "2", "3"]);
        assert_eq!(&rows[0][1], "5\" screen");

        let mut cursor = Cursor::from_bytes("q", text, ReaderOptions::default().with_header())?;
        cursor.filter_expr("id", "2")?;
        assert_eq!(collect(&mut cursor)?, vec![Record::from(vec!["2", "abc"])]);
        Ok(())
    }

    #[test]
    fn malformed_row_exhausts_the_cursor() -> Result<()> {
        let text = "a,b\n1,2\n3\n4,5\n";
        let mut cursor = Cursor::from_bytes("ragged", text, ReaderOptions::default())?;
        let err = cursor.advance().unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(cursor.phase(), Phase::Exhausted);
        assert!(!cursor.advance()?);
        assert!(cursor.current().is_none());

        cursor.reset()?;
        assert!(matches!(cursor.advance(), Err(Error::Parse(_))));
        Ok(())
    }

    #[test]
    fn non_ascii_dialect_is_rejected_up_front() {
        let mut options = ReaderOptions::default();
        options.parse_options.column_separator = '→';
        let err = Cursor::from_bytes("m", MEMBERS, options).err();
        assert!(matches!(err, Some(Error::InvalidConfig(_))));
    }

    #[test]
    fn filter_errors_are_eager() -> Result<()> {
        let mut no_header = Cursor::from_bytes("m", MEMBERS, ReaderOptions::default())?;
        assert!(matches!(
            no_header.filter_expr("name", "x"),
            Err(Error::HeaderNotDefined { .. })
        ));
        no_header.filter_expr(1usize, "shania")?;

        let mut cursor = members(ReaderOptions::default())?;
        assert!(matches!(
            cursor.filter_expr("age", "1"),
            Err(Error::UnknownColumn { .. })
        ));
        assert!(matches!(
            cursor.filter_expr("id", "<(float)1"),
            Err(Error::InvalidFilterOperator { .. })
        ));
        assert!(cursor.query().is_empty());
        Ok(())
    }

    #[test]
    fn apply_filters_is_all_or_nothing() -> Result<()> {
        let mut cursor = members(ReaderOptions::default())?;
        let good: BTreeMap<String, FilterSpec> =
            serde_yaml::from_str("name: ['%a', '!shania']\n'2': '<(date)1995-01-01'\n")?;
        let bad: BTreeMap<String, FilterSpec> =
            serde_yaml::from_str("name: michelle\nid: { from: 3, to: 1 }\n")?;

        assert!(matches!(
            cursor.apply_filters(&bad),
            Err(Error::InvalidRange(_))
        ));
        assert!(cursor.query().is_empty());

        cursor.apply_filters(&good)?;
        assert_eq!(cursor.query().len(), 2);
        assert_eq!(ids(&collect(&mut cursor)?), vec!["2"]);
        Ok(())
    }

    #[test]
    fn strict_mismatch_is_observable_lenient_is_silent() -> Result<()> {
        let text = "id,name\n1,shania\nx,jessica\n3,michelle\n";

        let mut lenient = Cursor::from_bytes("t", text, ReaderOptions::default().with_header())?;
        lenient.filter_expr("id", ">(integer)0")?;
        assert_eq!(ids(&collect(&mut lenient)?), vec!["1", "3"]);

        let mut options = ReaderOptions::default().with_header();
        options.strict_types = true;
        let mut strict = Cursor::from_bytes("t", text, options)?;
        strict.filter_expr("id", ">(integer)0")?;
        let err = strict.advance().unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { ref column, .. } if column == "id"));

        let err = lenient
            .matches(&Record::from(vec!["x", "jessica"]))
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        Ok(())
    }

    #[test]
    fn mixed_list_on_text_column_raises_when_strict() -> Result<()> {
        let mut cursor = members(ReaderOptions::default())?;
        cursor.filter_any("name", ["shania", ">(integer)1"])?;
        assert!(cursor.matches(&Record::from(vec!["1", "shania", "x"])).is_err());
        // lenient scan drops every row, since no name parses as a number
        assert!(collect(&mut cursor)?.is_empty());
        Ok(())
    }

    #[test]
    fn accessors_and_named_access() -> Result<()> {
        let text = "Location-ID,location name,Location ID\nA1,Depot,Z9\n";
        let mut cursor = Cursor::from_bytes("loc", text, ReaderOptions::default().with_header())?;
        assert_eq!(cursor.get(0usize)?, None);
        assert!(cursor.advance()?);

        assert_eq!(cursor.get("LOCATION NAME")?, Some("Depot"));
        assert_eq!(cursor.get("location-id")?, Some("A1"));
        assert_eq!(cursor.attr("location_id")?, Some("Z9"));
        assert_eq!(cursor.attr("location_name")?, Some("Depot"));
        assert!(matches!(cursor.attr("nope"), Err(Error::UnknownColumn { .. })));

        let json = cursor.current_json().unwrap();
        assert_eq!(json["location name"], "Depot");
        Ok(())
    }

    #[test]
    fn set_header_rules() -> Result<()> {
        let mut cursor = Cursor::from_bytes("m", MEMBERS, ReaderOptions::default())?;
        cursor.set_header(["a", "b", "c"])?;
        assert!(matches!(
            cursor.set_header(["x"]),
            Err(Error::HeaderAlreadyDefined)
        ));

        let mut started = Cursor::from_bytes("m", MEMBERS, ReaderOptions::default())?;
        started.advance()?;
        assert!(matches!(
            started.set_header(["a"]),
            Err(Error::ReadInProgress)
        ));

        let mut from_file = members(ReaderOptions::default())?;
        assert!(matches!(
            from_file.set_header(["a"]),
            Err(Error::HeaderAlreadyDefined)
        ));
        Ok(())
    }

    #[test]
    fn each_emits_records_or_batches() -> Result<()> {
        let mut cursor = members(ReaderOptions::default())?;
        let mut seen = Vec::new();
        cursor.each(|emit| -> Result<()> {
            if let Emit::Record { record, line } = emit {
                seen.push((record[1].to_string(), line));
            }
            Ok(())
        })?;
        assert_eq!(
            seen,
            vec![
                ("shania".to_string(), 2),
                ("jessica".to_string(), 3),
                ("michelle".to_string(), 4)
            ]
        );

        let mut options = ReaderOptions::default().with_chunk_size(2);
        options.emit_batches_only = true;
        let mut cursor = members(options)?;
        let mut sizes = Vec::new();
        cursor.each(|emit| -> Result<()> {
            if let Emit::Batch(batch) = emit {
                sizes.push(batch.len());
            }
            Ok(())
        })?;
        assert_eq!(sizes, vec![2, 1]);
        Ok(())
    }

    #[test]
    fn batches_drain_buffered_records_first() -> Result<()> {
        let mut cursor = members(ReaderOptions::default().with_chunk_size(2))?;
        assert!(cursor.advance()?);
        let sizes: Vec<usize> = cursor
            .batches()
            .map(|b| b.map(|b| b.len()))
            .collect::<crate::Result<_>>()?;
        assert_eq!(sizes, vec![1, 1]);
        assert_eq!(cursor.line_count(), 4);
        Ok(())
    }

    #[test]
    fn blank_lines_do_not_end_the_scan() -> Result<()> {
        let text = "a,b\n\n\n\n1,2\n";
        let mut cursor = Cursor::from_bytes(
            "blank",
            text,
            ReaderOptions::default().with_header().with_chunk_size(1),
        )?;
        assert_eq!(ids(&collect(&mut cursor)?), vec!["1"]);
        Ok(())
    }

    #[test]
    fn empty_source_with_header_has_no_columns() -> Result<()> {
        let mut cursor = Cursor::from_bytes("empty", "", ReaderOptions::default().with_header())?;
        assert!(!cursor.header().is_defined());
        assert!(!cursor.advance()?);
        Ok(())
    }

    #[test]
    fn invalid_options_fail_before_opening() {
        let err = Cursor::open(
            "/does/not/matter.csv",
            ReaderOptions::default().with_chunk_size(0),
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
