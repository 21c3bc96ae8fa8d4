// src/process/parser.rs

use csv::{ReaderBuilder, Terminator};

use super::chunk::RawBatch;
use crate::{config::ParseOptions, schema::Record, Result};

/// Turns raw text into records with the configured dialect.
#[derive(Debug, Clone)]
pub struct RecordParser {
    options: ParseOptions,
    delimiter: u8,
    quote: u8,
}

impl RecordParser {
    pub fn new(options: ParseOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            delimiter: options.column_separator_byte()?,
            quote: options.quote_byte()?,
            options,
        })
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    fn builder(&self) -> ReaderBuilder {
        let terminator = match self.options.row_separator.as_str() {
            "\n" | "\r\n" => Terminator::CRLF,
            other => Terminator::Any(other.as_bytes().first().copied().unwrap_or(b'\n')),
        };

        let mut builder = ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(false)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .double_quote(true)
            .terminator(terminator);
        builder
    }

    /// Parse a blob of complete lines. Blank lines yield no record.
    pub fn parse(&self, text: &str) -> Result<Vec<Record>> {
        let mut rdr = self.builder().from_reader(text.as_bytes());
        let mut records = Vec::new();
        for result in rdr.records() {
            records.push(Record::from(result?));
        }
        Ok(records)
    }

    pub fn parse_batch(&self, raw: &RawBatch) -> Result<Vec<Record>> {
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        self.parse(&raw.join(&self.options.row_separator))
    }
}
