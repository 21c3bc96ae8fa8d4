// src/process/chunk.rs

use std::io::{self, BufRead};
use tracing::{trace, warn};

use crate::{config::ParseOptions, Error, Result};

/// Raw, unparsed lines from one refill, each still carrying its terminator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBatch {
    lines: Vec<String>,
}

impl RawBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// Concatenate the lines into one text blob for the record parser,
    /// terminating any line that arrived without a separator.
    pub fn join(&self, row_separator: &str) -> String {
        let total: usize = self.lines.iter().map(|l| l.len() + row_separator.len()).sum();
        let mut text = String::with_capacity(total);
        for line in &self.lines {
            text.push_str(line);
            if !line.ends_with('\n') && !line.ends_with(row_separator) {
                text.push_str(row_separator);
            }
        }
        text
    }
}

impl From<Vec<String>> for RawBatch {
    fn from(lines: Vec<String>) -> Self {
        Self { lines }
    }
}

/// Anything that hands out raw line batches in source order.
pub trait RawBatchSource: Send {
    /// Up to `max_lines` lines; empty only once the source is exhausted.
    fn refill(&mut self, max_lines: usize) -> Result<RawBatch>;

    fn is_exhausted(&self) -> bool;
}

/// Physical lines joined into one logical line before an unclosed quote is
/// given up on and the line is handed out as-is.
pub const MAX_CONTINUATION_LINES: usize = 256;

/// Where the scanner stands inside the current field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteScan {
    FieldStart,
    Unquoted,
    Quoted,
    /// A quote seen inside a quoted field: closes it unless another quote follows.
    QuoteInQuoted,
}

impl QuoteScan {
    fn step(self, b: u8, quote: u8, column: u8, row: u8) -> Self {
        let boundary = b == column || b == row;
        match self {
            QuoteScan::Quoted if b == quote => QuoteScan::QuoteInQuoted,
            QuoteScan::Quoted => QuoteScan::Quoted,
            QuoteScan::QuoteInQuoted if b == quote => QuoteScan::Quoted,
            QuoteScan::FieldStart if b == quote => QuoteScan::Quoted,
            _ if boundary => QuoteScan::FieldStart,
            _ => QuoteScan::Unquoted,
        }
    }
}

/// Pulls bounded batches of lines from a buffered reader.
///
/// A line ends at the last byte of the row separator. A quote only opens a
/// quoted field at the start of a field; a stray quote inside an unquoted
/// value is literal. If a line ends inside a quoted field the following
/// physical lines are appended, up to [`MAX_CONTINUATION_LINES`].
pub struct ChunkBuffer<R> {
    reader: R,
    name: String,
    delimiter: u8,
    column: u8,
    quote: u8,
    exhausted: bool,
    lines_read: u64,
}

impl<R: BufRead + Send> ChunkBuffer<R> {
    pub fn new(reader: R, name: impl Into<String>, options: &ParseOptions) -> Result<Self> {
        options.validate()?;
        let delimiter = options
            .row_separator
            .as_bytes()
            .last()
            .copied()
            .unwrap_or(b'\n');
        Ok(Self {
            reader,
            name: name.into(),
            delimiter,
            column: options.column_separator_byte()?,
            quote: options.quote_byte()?,
            exhausted: false,
            lines_read: 0,
        })
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let mut scan = QuoteScan::FieldStart;
        let mut physical = 0usize;
        loop {
            let start = buf.len();
            let n = self
                .reader
                .read_until(self.delimiter, &mut buf)
                .map_err(|e| Error::io(&self.name, e))?;
            if n == 0 {
                break;
            }
            physical += 1;
            for &b in &buf[start..] {
                scan = scan.step(b, self.quote, self.column, self.delimiter);
            }
            if scan != QuoteScan::Quoted {
                break;
            }
            if physical >= MAX_CONTINUATION_LINES {
                warn!(
                    source = %self.name,
                    line = self.lines_read + 1,
                    joined = physical,
                    "quoted field left open, cutting the line"
                );
                break;
            }
        }

        if buf.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }
        self.lines_read += 1;
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Peek for end of input so exhaustion is known without another refill.
    fn probe_end(&mut self) -> Result<()> {
        let remaining = self
            .reader
            .fill_buf()
            .map_err(|e| Error::io(&self.name, e))?;
        if remaining.is_empty() {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl ChunkBuffer<io::Empty> {
    /// A buffer that holds no handle and is already exhausted.
    pub fn closed() -> Self {
        Self {
            reader: io::empty(),
            name: "closed".to_string(),
            delimiter: b'\n',
            column: b',',
            quote: b'"',
            exhausted: true,
            lines_read: 0,
        }
    }
}

impl<R: BufRead + Send> RawBatchSource for ChunkBuffer<R> {
    fn refill(&mut self, max_lines: usize) -> Result<RawBatch> {
        if self.exhausted {
            return Ok(RawBatch::default());
        }

        let mut batch = RawBatch::with_capacity(max_lines.min(4096));
        while batch.len() < max_lines {
            match self.read_line()? {
                Some(line) => batch.push(line),
                None => break,
            }
        }
        if !self.exhausted {
            self.probe_end()?;
        }

        trace!(
            source = %self.name,
            lines = batch.len(),
            total = self.lines_read,
            exhausted = self.exhausted,
            "refilled chunk"
        );
        Ok(batch)
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
