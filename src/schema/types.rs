// src/schema/types.rs

use serde::Serialize;
use std::{fmt, ops::Index};

use super::FieldIndex;

/// One parsed row: the raw field text, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: Vec<String>,
}

impl Record {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }

    /// Keyed view of the row. Without a header the row is emitted as a JSON array;
    /// with one, fields past the header width are keyed by position.
    pub fn to_json(&self, header: &FieldIndex) -> serde_json::Value {
        let Some(columns) = header.columns() else {
            return serde_json::Value::from(self.fields.clone());
        };

        let mut map = serde_json::Map::with_capacity(self.fields.len());
        for (i, value) in self.fields.iter().enumerate() {
            let key = columns.get(i).cloned().unwrap_or_else(|| i.to_string());
            map.insert(key, serde_json::Value::String(value.clone()));
        }
        serde_json::Value::Object(map)
    }
}

impl Index<usize> for Record {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.fields[index]
    }
}

impl From<Vec<String>> for Record {
    fn from(fields: Vec<String>) -> Self {
        Self::new(fields)
    }
}

impl From<Vec<&str>> for Record {
    fn from(fields: Vec<&str>) -> Self {
        Self::new(fields.into_iter().map(str::to_string).collect())
    }
}

impl From<csv::StringRecord> for Record {
    fn from(record: csv::StringRecord) -> Self {
        Self::new(record.iter().map(str::to_string).collect())
    }
}

/// Addresses a column either by position or by (case-insensitive) name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    Index(usize),
    Name(String),
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Index(i) => write!(f, "{}", i),
            ColumnKey::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for ColumnKey {
    fn from(index: usize) -> Self {
        ColumnKey::Index(index)
    }
}

impl From<&str> for ColumnKey {
    fn from(name: &str) -> Self {
        ColumnKey::Name(name.to_string())
    }
}

impl From<String> for ColumnKey {
    fn from(name: String) -> Self {
        ColumnKey::Name(name)
    }
}

impl From<&String> for ColumnKey {
    fn from(name: &String) -> Self {
        ColumnKey::Name(name.clone())
    }
}
