// src/config.rs

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};
use tracing::debug;

use crate::{query::FilterSpec, Error, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Where the header comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderOption {
    /// `true` consumes the first line of the source as the header.
    Detect(bool),
    /// Explicit column names; the first line is treated as data.
    Columns(Vec<String>),
}

impl Default for HeaderOption {
    fn default() -> Self {
        HeaderOption::Detect(false)
    }
}

/// Dialect handed to the record parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub column_separator: char,
    pub row_separator: String,
    pub quote_char: char,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            column_separator: ',',
            row_separator: "\n".to_string(),
            quote_char: '"',
        }
    }
}

fn ascii_byte(what: &str, c: char) -> Result<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| {
            Error::InvalidConfig(format!("{} {:?} must be a single ASCII character", what, c))
        })
}

impl ParseOptions {
    pub(crate) fn column_separator_byte(&self) -> Result<u8> {
        ascii_byte("column separator", self.column_separator)
    }

    pub(crate) fn quote_byte(&self) -> Result<u8> {
        ascii_byte("quote char", self.quote_char)
    }

    pub fn validate(&self) -> Result<()> {
        self.column_separator_byte()?;
        self.quote_byte()?;
        if self.row_separator.is_empty() {
            return Err(Error::InvalidConfig("row separator is empty".into()));
        }
        let sep = self.row_separator.as_str();
        if !(sep == "\r\n" || (sep.len() == 1 && sep.is_ascii())) {
            return Err(Error::InvalidConfig(format!(
                "row separator {:?} must be one ASCII character or \\r\\n",
                sep
            )));
        }
        if self.row_separator.contains(self.column_separator) {
            return Err(Error::InvalidConfig(
                "row separator and column separator overlap".into(),
            ));
        }
        Ok(())
    }
}

/// Construction options for a [`crate::Cursor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Raw lines pulled per refill, and the target batch size.
    pub chunk_size: usize,
    pub header: HeaderOption,
    pub parse_options: ParseOptions,
    /// When set, `Cursor::each` hands out whole batches instead of records.
    pub emit_batches_only: bool,
    /// Channel capacity (in raw batches) for background reading. `None` reads inline.
    pub prefetch: Option<usize>,
    /// Surface type mismatches from the filter pass instead of skipping the row.
    pub strict_types: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            header: HeaderOption::default(),
            parse_options: ParseOptions::default(),
            emit_batches_only: false,
            prefetch: None,
            strict_types: false,
        }
    }
}

impl ReaderOptions {
    pub fn with_header(mut self) -> Self {
        self.header = HeaderOption::Detect(true);
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header = HeaderOption::Columns(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be at least 1".into()));
        }
        if self.prefetch == Some(0) {
            return Err(Error::InvalidConfig("prefetch capacity must be at least 1".into()));
        }
        self.parse_options.validate()
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let options: Self =
            serde_yaml::from_str(text).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let options: Self =
            serde_json::from_str(text).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }
}

/// A reader configuration plus a declarative filter, as loaded by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(flatten)]
    pub reader: ReaderOptions,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterSpec>,
}

impl ScanConfig {
    /// Load from `.json`, otherwise YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e))?;
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

        let config: Self = if is_json {
            serde_json::from_str(&text).map_err(|e| Error::InvalidConfig(e.to_string()))?
        } else {
            serde_yaml::from_str(&text).map_err(|e| Error::InvalidConfig(e.to_string()))?
        };
        config.reader.validate()?;
        debug!(path = %path.display(), filters = config.filters.len(), "loaded scan config");
        Ok(config)
    }
}
