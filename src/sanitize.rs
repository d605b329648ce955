//! Input cleaning and log redaction
//!
//! Pure helpers applied to every user-supplied free-text field before
//! validation, and to every error message before it reaches a log sink or a
//! caller-facing error.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::payments::types::Metadata;

const REDACTED: &str = "[REDACTED]";

/// Trim, lowercase and strip control/whitespace characters from an email.
pub fn clean_email(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() && !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Strip control characters and angle brackets from a display name and
/// collapse runs of whitespace.
pub fn clean_name(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !c.is_control() && *c != '<' && *c != '>')
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep a leading `+` and digits; everything else (spaces, dashes,
/// parentheses) is dropped.
pub fn clean_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut cleaned = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        if c.is_ascii_digit() || (i == 0 && c == '+') {
            cleaned.push(c);
        }
    }
    cleaned
}

/// References travel into provider payloads and logs verbatim, so only
/// alphanumerics and `.`, `_`, `-` survive.
pub fn clean_reference(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

/// Strip control characters from free text, preserving everything else.
pub fn clean_text(raw: &str) -> String {
    raw.trim().chars().filter(|c| !c.is_control()).collect()
}

/// Clean every string value in a metadata mapping, recursively. Keys and
/// non-string values pass through untouched.
pub fn clean_metadata(mut metadata: Metadata) -> Metadata {
    for value in metadata.values_mut() {
        clean_value(value);
    }
    metadata
}

fn clean_value(value: &mut Value) {
    match value {
        Value::String(s) => *s = clean_text(s),
        Value::Array(items) => items.iter_mut().for_each(clean_value),
        Value::Object(map) => map.values_mut().for_each(clean_value),
        _ => {}
    }
}

fn secret_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // Paystack-style secret/public keys
            r"(?i)\b(?:sk|pk)_(?:test|live)_[0-9a-z]+",
            // Flutterwave public keys
            r"\bFLWPUBK(?:_TEST)?-[0-9A-Za-z]+(?:-X)?",
            // Monnify api keys
            r"\bMK_(?:TEST|PROD)_[0-9A-Za-z]+",
            // Card-adjacent digit runs
            r"\b\d{12,19}\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("redaction patterns are valid"))
        .collect()
    })
}

/// Mask key-like tokens and long digit runs before a message is logged or
/// surfaced to the caller.
pub fn redact_secrets(message: &str) -> String {
    let mut redacted = message.to_string();
    for pattern in secret_patterns() {
        redacted = pattern.replace_all(&redacted, REDACTED).into_owned();
    }
    redacted
}
