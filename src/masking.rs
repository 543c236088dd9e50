use crate::parser::ParsedLine;
use once_cell::sync::Lazy;
use regex::Regex;

pub const KEY_SEPARATOR: &str = " | ";
pub const EMPTY_TOKEN: &str = "<EMPTY>";

static RE_UUID: Lazy<Regex> = Lazy::new(|| {
    // RFC 4122 layout: version nibble 1-5, variant nibble 8/9/a/b
    Regex::new(r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[1-5][0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}\b").unwrap()
});

static RE_HEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b0x[0-9a-fA-F]+\b").unwrap()
});

static RE_INT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d+\b").unwrap()
});

static RE_SPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").unwrap()
});

pub fn mask_message(input: &str) -> String {
    // Order matters: hex before plain integers so `0x1A` is not split into <NUM>A
    let s = RE_UUID.replace_all(input, "<UUID>");
    let s = RE_HEX.replace_all(&s, "<HEX>");
    let s = RE_INT.replace_all(&s, "<NUM>");
    let s = RE_SPACE.replace_all(&s, " ");
    let trimmed = s.trim();
    if trimmed.is_empty() {
        EMPTY_TOKEN.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Builds the pattern key `LEVEL | logger | masked message`, omitting absent parts.
pub fn fingerprint(level: Option<&str>, logger: Option<&str>, message: &str) -> String {
    let masked = mask_message(message);
    let mut parts: Vec<&str> = Vec::with_capacity(3);
    if let Some(level) = level.filter(|l| !l.is_empty()) {
        parts.push(level);
    }
    if let Some(logger) = logger.filter(|l| !l.is_empty()) {
        parts.push(logger);
    }
    parts.push(&masked);
    parts.join(KEY_SEPARATOR)
}

pub fn fingerprint_line(line: &ParsedLine) -> String {
    fingerprint(line.level.as_deref(), line.logger.as_deref(), line.pattern_text())
}
