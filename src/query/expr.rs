// src/query/expr.rs
//
// Textual filter grammar, parsed once into a `Predicate`:
//   >(integer)5   <(date)01-01-1997   !value   %substring   plain

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::predicate::{CompareOp, Predicate, ValueKind};
use crate::{
    process::utils::{parse_date, parse_number},
    Error, Result,
};

static COMPARISON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([<>])\(([A-Za-z]+)\)(.*)$").expect("valid comparison regex"));

fn kind_of(expr: &str, kind: &str) -> Result<ValueKind> {
    match kind.to_ascii_lowercase().as_str() {
        "integer" => Ok(ValueKind::Number),
        "date" => Ok(ValueKind::Date),
        other => Err(Error::operator(
            expr,
            format!("unknown comparison type `{}`, use `integer` or `date`", other),
        )),
    }
}

impl Predicate {
    /// Parse one filter expression. Anything without a recognised prefix is a literal.
    pub fn parse(expr: &str) -> Result<Self> {
        match expr.chars().next() {
            Some('>') | Some('<') => {
                let caps = COMPARISON.captures(expr).ok_or_else(|| {
                    Error::operator(expr, "expected `>(kind)bound` or `<(kind)bound`")
                })?;
                let op = if &caps[1] == ">" {
                    CompareOp::Gt
                } else {
                    CompareOp::Lt
                };
                let bound = caps[3].trim();
                match kind_of(expr, &caps[2])? {
                    ValueKind::Number => {
                        let value = parse_number(bound).ok_or_else(|| {
                            Error::operator(expr, format!("`{}` is not a number", bound))
                        })?;
                        Ok(Predicate::NumericCompare(op, value))
                    }
                    ValueKind::Date => {
                        let value = parse_date(bound).ok_or_else(|| {
                            Error::operator(expr, format!("`{}` is not a date", bound))
                        })?;
                        Ok(Predicate::DateCompare(op, value))
                    }
                }
            }
            Some('!') => Ok(Predicate::NotEquals(expr[1..].to_string())),
            Some('%') => Ok(Predicate::Contains(expr[1..].to_string())),
            _ => Ok(Predicate::Equals(expr.to_string())),
        }
    }

    /// A list filter; each member is parsed with [`Predicate::parse`].
    pub fn one_of<I, S>(exprs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let members = exprs
            .into_iter()
            .map(|e| Predicate::parse(e.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Predicate::any_of(members))
    }
}

/// A literal from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Integer(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Text(v) => f.write_str(v),
        }
    }
}

impl Scalar {
    fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Integer(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// Declarative filter value: a literal or expression, a list, or a `from`/`to` range.
// List before Range: untagged structs also accept two-element sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterSpec {
    List(Vec<Scalar>),
    Range { from: Scalar, to: Scalar },
    Value(Scalar),
}

impl FilterSpec {
    pub fn to_predicate(&self) -> Result<Predicate> {
        match self {
            FilterSpec::Value(Scalar::Text(expr)) => Predicate::parse(expr),
            FilterSpec::Value(other) => Ok(Predicate::Equals(other.to_string())),
            FilterSpec::List(items) => {
                let members = items
                    .iter()
                    .map(|item| match item {
                        Scalar::Text(expr) => Predicate::parse(expr),
                        other => Ok(Predicate::Equals(other.to_string())),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Predicate::any_of(members))
            }
            FilterSpec::Range { from, to } => {
                if let (Some(lo), Some(hi)) = (from.as_number(), to.as_number()) {
                    return Predicate::numeric_range(lo, hi);
                }
                let as_date = |s: &Scalar| match s {
                    Scalar::Text(t) => parse_date(t),
                    _ => None,
                };
                match (as_date(from), as_date(to)) {
                    (Some(lo), Some(hi)) => Predicate::date_range(lo, hi),
                    _ => Err(Error::InvalidRange(format!(
                        "range {}..{} must be two numbers or two dates",
                        from, to
                    ))),
                }
            }
        }
    }
}
