// src/schema/field_index.rs

use std::collections::HashMap;

use super::types::ColumnKey;
use crate::{Error, Result};

/// Column name → position lookup, defined at most once per reader.
///
/// Names are lower-cased on entry. When two columns share a lower-cased name the
/// later one wins, for both name lookups and accessor lookups.
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
    columns: Option<Vec<String>>,
    by_name: HashMap<String, usize>,
    by_accessor: HashMap<String, usize>,
}

/// `Location-ID` → `location_id`: lower-case, every non-alphabetic char becomes `_`.
pub fn accessor_name(column: &str) -> String {
    column
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphabetic() { c } else { '_' })
        .collect()
}

impl FieldIndex {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::default();
        index.install(columns.into_iter().map(|c| c.as_ref().to_lowercase()).collect());
        index
    }

    fn install(&mut self, columns: Vec<String>) {
        self.by_name.clear();
        self.by_accessor.clear();
        // plain inserts in column order: later duplicates overwrite earlier ones
        for (i, name) in columns.iter().enumerate() {
            self.by_name.insert(name.clone(), i);
            self.by_accessor.insert(accessor_name(name), i);
        }
        self.columns = Some(columns);
    }

    /// Define the header. Fails if one is already set.
    pub fn define<I, S>(&mut self, columns: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.is_defined() {
            return Err(Error::HeaderAlreadyDefined);
        }
        self.install(columns.into_iter().map(|c| c.as_ref().to_lowercase()).collect());
        Ok(())
    }

    pub fn is_defined(&self) -> bool {
        self.columns.is_some()
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    pub fn len(&self) -> usize {
        self.columns.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn resolve(&self, key: &ColumnKey) -> Result<usize> {
        match key {
            ColumnKey::Index(i) => Ok(*i),
            ColumnKey::Name(name) => self.lookup(&self.by_name, name, &name.to_lowercase()),
        }
    }

    /// Position of the generated accessor `name` (see [`accessor_name`]).
    pub fn accessor(&self, name: &str) -> Result<usize> {
        self.lookup(&self.by_accessor, name, &accessor_name(name))
    }

    fn lookup(&self, table: &HashMap<String, usize>, raw: &str, key: &str) -> Result<usize> {
        if !self.is_defined() {
            return Err(Error::HeaderNotDefined {
                column: raw.to_string(),
            });
        }
        table.get(key).copied().ok_or_else(|| Error::UnknownColumn {
            column: raw.to_string(),
        })
    }

    /// Human-readable label for an index, used in error messages.
    pub fn label(&self, index: usize) -> String {
        self.columns
            .as_ref()
            .and_then(|c| c.get(index).cloned())
            .unwrap_or_else(|| index.to_string())
    }
}
