use std::io;

use thiserror::Error;

use crate::query::ValueKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {source_name}: {source}")]
    SourceIo {
        source_name: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed record: {0}")]
    Parse(#[from] csv::Error),

    #[error("header is not defined, cannot resolve column `{column}`")]
    HeaderNotDefined { column: String },

    #[error("unknown column `{column}`")]
    UnknownColumn { column: String },

    #[error("header has already been defined")]
    HeaderAlreadyDefined,

    #[error("header cannot change once reading has started")]
    ReadInProgress,

    #[error("invalid filter `{expression}`: {reason}")]
    InvalidFilterOperator { expression: String, reason: String },

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("column `{column}` value {value:?} is not a valid {expected}")]
    TypeMismatch {
        column: String,
        value: String,
        expected: ValueKind,
    },

    #[error("column `{column}` (index {index}) is missing from the record")]
    MissingField { column: String, index: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(source_name: impl Into<String>, source: io::Error) -> Self {
        Error::SourceIo {
            source_name: source_name.into(),
            source,
        }
    }

    pub(crate) fn operator(expression: &str, reason: impl Into<String>) -> Self {
        Error::InvalidFilterOperator {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures the lenient pre-filter treats as "row does not match".
    pub fn is_row_level(&self) -> bool {
        matches!(self, Error::TypeMismatch { .. } | Error::MissingField { .. })
    }
}
