// src/query/predicate.rs

use chrono::NaiveDate;
use std::fmt;

use crate::{
    process::utils::{parse_date, parse_number},
    Error, Result,
};

/// The typed value a comparison needs a field to parse as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Number,
    Date,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Number => f.write_str("number"),
            ValueKind::Date => f.write_str("date"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Gt,
}

impl CompareOp {
    fn holds<T: PartialOrd>(self, value: &T, bound: &T) -> bool {
        match self {
            CompareOp::Lt => value < bound,
            CompareOp::Gt => value > bound,
        }
    }
}

/// Inclusive `lo..=hi`, only constructible with `lo <= hi`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds<T> {
    lo: T,
    hi: T,
}

impl<T: PartialOrd + fmt::Debug> Bounds<T> {
    pub fn new(lo: T, hi: T) -> Result<Self> {
        match lo.partial_cmp(&hi) {
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal) => Ok(Self { lo, hi }),
            Some(std::cmp::Ordering::Greater) => Err(Error::InvalidRange(format!(
                "lower bound {:?} is greater than upper bound {:?}",
                lo, hi
            ))),
            None => Err(Error::InvalidRange(format!(
                "bounds {:?} and {:?} are not comparable",
                lo, hi
            ))),
        }
    }

    pub fn lo(&self) -> &T {
        &self.lo
    }

    pub fn hi(&self) -> &T {
        &self.hi
    }

    pub fn contains(&self, value: &T) -> bool {
        &self.lo <= value && value <= &self.hi
    }
}

/// A field failed to parse as the type a predicate compares on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub expected: ValueKind,
}

/// A single-column filter, evaluated against cleaned field text.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals(String),
    /// List-valued filter. Negations are vetoes; the remaining members are OR-ed.
    OneOf(Vec<Predicate>),
    NotEquals(String),
    Contains(String),
    NumericRange(Bounds<f64>),
    DateRange(Bounds<NaiveDate>),
    NumericCompare(CompareOp, f64),
    DateCompare(CompareOp, NaiveDate),
}

impl Predicate {
    pub fn equals(value: impl Into<String>) -> Self {
        Predicate::Equals(value.into())
    }

    pub fn not_equals(value: impl Into<String>) -> Self {
        Predicate::NotEquals(value.into())
    }

    pub fn contains(needle: impl Into<String>) -> Self {
        Predicate::Contains(needle.into())
    }

    pub fn numeric_range(lo: f64, hi: f64) -> Result<Self> {
        Ok(Predicate::NumericRange(Bounds::new(lo, hi)?))
    }

    pub fn date_range(lo: NaiveDate, hi: NaiveDate) -> Result<Self> {
        Ok(Predicate::DateRange(Bounds::new(lo, hi)?))
    }

    pub fn greater_than(bound: f64) -> Self {
        Predicate::NumericCompare(CompareOp::Gt, bound)
    }

    pub fn less_than(bound: f64) -> Self {
        Predicate::NumericCompare(CompareOp::Lt, bound)
    }

    pub fn after(bound: NaiveDate) -> Self {
        Predicate::DateCompare(CompareOp::Gt, bound)
    }

    pub fn before(bound: NaiveDate) -> Self {
        Predicate::DateCompare(CompareOp::Lt, bound)
    }

    pub fn any_of(members: impl IntoIterator<Item = Predicate>) -> Self {
        let mut flat = Vec::new();
        for member in members {
            match member {
                Predicate::OneOf(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        Predicate::OneOf(flat)
    }

    fn is_veto(&self) -> bool {
        matches!(self, Predicate::NotEquals(_))
    }

    /// Strict evaluation: a field that does not parse as the compared type is an error.
    pub fn evaluate(&self, value: &str) -> std::result::Result<bool, Mismatch> {
        match self {
            Predicate::Equals(v) => Ok(value == v),
            Predicate::NotEquals(v) => Ok(value != v),
            Predicate::Contains(s) => Ok(value.contains(s.as_str())),
            Predicate::NumericRange(bounds) => Ok(bounds.contains(&number(value)?)),
            Predicate::DateRange(bounds) => Ok(bounds.contains(&date(value)?)),
            Predicate::NumericCompare(op, bound) => Ok(op.holds(&number(value)?, bound)),
            Predicate::DateCompare(op, bound) => Ok(op.holds(&date(value)?, bound)),
            Predicate::OneOf(members) => {
                if members.is_empty() {
                    return Ok(false);
                }
                // every member runs so a type error surfaces regardless of order
                let mut first_err = None;
                let mut vetoed = false;
                let mut has_positive = false;
                let mut positive_hit = false;
                for member in members {
                    match member.evaluate(value) {
                        Ok(hit) if member.is_veto() => vetoed |= !hit,
                        Ok(hit) => {
                            has_positive = true;
                            positive_hit |= hit;
                        }
                        Err(e) => {
                            first_err.get_or_insert(e);
                        }
                    }
                }
                if let Some(e) = first_err {
                    return Err(e);
                }
                Ok(!vetoed && (!has_positive || positive_hit))
            }
        }
    }
}

fn number(value: &str) -> std::result::Result<f64, Mismatch> {
    parse_number(value).ok_or(Mismatch {
        expected: ValueKind::Number,
    })
}

fn date(value: &str) -> std::result::Result<NaiveDate, Mismatch> {
    parse_date(value).ok_or(Mismatch {
        expected: ValueKind::Date,
    })
}
