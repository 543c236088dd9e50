use chrono::{NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("unrecognized timestamp format: {0}")]
    Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLine {
    pub timestamp_raw: Option<String>,
    pub level: Option<String>,
    pub logger: Option<String>,
    pub message: String,
    pub raw_text: String,
    pub line_number: usize,
}

impl ParsedLine {
    /// True when the line matched the `timestamp level [logger] message` shape.
    pub fn is_structured(&self) -> bool {
        self.level.is_some()
    }

    /// Text handed to the fingerprinter. An empty message body falls back to the raw line.
    pub fn pattern_text(&self) -> &str {
        if self.message.is_empty() { &self.raw_text } else { &self.message }
    }

    /// Text kept as a human-readable example of the line's pattern.
    pub fn example_text(&self) -> &str {
        if self.message.is_empty() { self.raw_text.trim() } else { &self.message }
    }

    /// `None` when the line carries no timestamp at all, `Some(Err(_))` when it
    /// carries one in a format we cannot convert.
    pub fn epoch_seconds(&self) -> Option<Result<f64, TimestampError>> {
        self.timestamp_raw.as_deref().map(parse_timestamp)
    }
}

// 2026-01-29 10:22:01,123 INFO my.module Something happened
// 2026-01-29T10:22:01Z ERROR [Auth] Login failed
static RE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<ts>[0-9]{4}-[0-9]{2}-[0-9]{2}[ T][0-9]{2}:[0-9]{2}:[0-9]{2}(?:[.,][0-9]{3})?Z?)\s+(?P<level>[A-Z]+)\s+(?:(?P<logger>[\w.\-\[\]/]+)\s+)?(?P<msg>.*)$",
    )
    .unwrap()
});

// Only the space-separated form takes fractional seconds.
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%SZ"];

pub fn parse_line(line: &str, line_number: usize) -> ParsedLine {
    let raw = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
    match RE_LINE.captures(raw) {
        Some(caps) => {
            let level = caps.name("level").map(|m| normalize_level(m.as_str()));
            ParsedLine {
                timestamp_raw: caps.name("ts").map(|m| m.as_str().to_string()),
                level,
                logger: caps.name("logger").map(|m| m.as_str().to_string()),
                message: caps.name("msg").map(|m| m.as_str().to_string()).unwrap_or_default(),
                raw_text: raw.to_string(),
                line_number,
            }
        }
        None => ParsedLine {
            timestamp_raw: None,
            level: None,
            logger: None,
            message: raw.trim().to_string(),
            raw_text: raw.to_string(),
            line_number,
        },
    }
}

/// Unknown uppercase tokens are kept verbatim so new levels still group on their own.
pub fn normalize_level(level: &str) -> String {
    match level {
        "WARNING" => "WARN".to_string(),
        other => other.to_string(),
    }
}

/// Converts a matched timestamp into fractional epoch seconds. Naive values are read as UTC.
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let normalized = ts.replace(',', ".");
    for fmt in TIMESTAMP_FORMATS.iter() {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            let dt = Utc.from_utc_datetime(&ndt);
            return Ok(dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9);
        }
    }
    Err(TimestampError::Unrecognized(ts.to_string()))
}

/// Splits decoded file content into lines on `\n`, `\r\n` and lone `\r`.
/// A trailing terminator does not produce an extra empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        match rest.find(|c: char| c == '\n' || c == '\r') {
            Some(pos) => {
                out.push(&rest[..pos]);
                let skip = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[pos + skip..];
            }
            None => {
                out.push(rest);
                break;
            }
        }
    }
    out
}

pub fn parse_lines(lines: &[&str]) -> Vec<ParsedLine> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| parse_line(line, i + 1))
        .collect()
}
