use chrono::{NaiveDate, NaiveDateTime};
use std::borrow::Cow;

use crate::config::ParseOptions;

/// Strip row-separator artifacts, then one outer quote on each side.
///
/// Values that crossed a record boundary inside quotes keep the separator in
/// their text; it is removed here before comparison.
pub fn clean_field<'a>(raw: &'a str, options: &ParseOptions) -> Cow<'a, str> {
    let sep = options.row_separator.as_str();
    if raw.contains(sep) {
        let joined = raw.replace(sep, "");
        return Cow::Owned(trim_quotes(&joined, options.quote_char).to_string());
    }
    Cow::Borrowed(trim_quotes(raw, options.quote_char))
}

fn trim_quotes(text: &str, quote: char) -> &str {
    let text = text.strip_suffix('\r').unwrap_or(text);
    let text = text.strip_prefix(quote).unwrap_or(text);
    text.strip_suffix(quote).unwrap_or(text)
}

/// Drop the trailing row separator (and a dangling `\r`) from a raw line.
pub fn strip_terminator<'a>(line: &'a str, options: &ParseOptions) -> &'a str {
    let line = line
        .strip_suffix(options.row_separator.as_str())
        .unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Cheap, quote-unaware split used by the filter pass.
pub fn split_line<'a>(line: &'a str, options: &ParseOptions) -> Vec<&'a str> {
    strip_terminator(line, options)
        .split(options.column_separator)
        .collect()
}

pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| !v.is_nan())
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%d-%m-%Y", "%d/%m/%Y", "%d %b %Y", "%b %d, %Y", "%b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%dT%H:%M:%S%.f",
    "%Y%m%dT%H:%M:%S%.f",
    "%Y%m%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Calendar date from the common textual layouts; a time part is accepted and dropped.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    // RFC 3339 with an offset, e.g. 2024-12-14T18:02:37+10:00
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.date_naive())
}
