// src/query/set.rs

use std::collections::BTreeMap;

use super::predicate::Predicate;
use crate::{
    config::ParseOptions,
    process::utils::clean_field,
    schema::{ColumnKey, FieldIndex, Record},
    Error, Result,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFilter {
    /// Name used in error messages; the header name when one was given.
    pub label: String,
    pub predicate: Predicate,
}

/// Per-column predicates, AND-ed together. Keys are resolved column indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySet {
    columns: BTreeMap<usize, ColumnFilter>,
}

impl QuerySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the filter on one column.
    pub fn insert(&mut self, index: usize, label: impl Into<String>, predicate: Predicate) {
        self.columns.insert(
            index,
            ColumnFilter {
                label: label.into(),
                predicate,
            },
        );
    }

    /// Resolve `key` against `header` now, so a bad column fails before any scan.
    pub fn define(
        &mut self,
        header: &FieldIndex,
        key: &ColumnKey,
        predicate: Predicate,
    ) -> Result<usize> {
        let index = header.resolve(key)?;
        let label = match key {
            ColumnKey::Name(name) => name.clone(),
            ColumnKey::Index(_) => header.label(index),
        };
        self.insert(index, label, predicate);
        Ok(index)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn clear(&mut self) {
        self.columns.clear();
    }

    pub fn get(&self, index: usize) -> Option<&ColumnFilter> {
        self.columns.get(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ColumnFilter)> {
        self.columns.iter().map(|(i, f)| (*i, f))
    }

    /// Strict evaluation over raw split fields.
    ///
    /// Stops at the first column that rejects. A missing field or a field that
    /// does not parse as the compared type is an error.
    pub fn evaluate<S: AsRef<str>>(&self, fields: &[S], options: &ParseOptions) -> Result<bool> {
        for (&index, filter) in &self.columns {
            let raw = fields.get(index).ok_or_else(|| Error::MissingField {
                column: filter.label.clone(),
                index,
            })?;
            let value = clean_field(raw.as_ref(), options);
            let hit = filter
                .predicate
                .evaluate(&value)
                .map_err(|m| Error::TypeMismatch {
                    column: filter.label.clone(),
                    value: value.to_string(),
                    expected: m.expected,
                })?;
            if !hit {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Strict evaluation over an already parsed record.
    pub fn evaluate_record(&self, record: &Record, options: &ParseOptions) -> Result<bool> {
        self.evaluate(record.fields(), options)
    }
}
