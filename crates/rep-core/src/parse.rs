//! Strict `key=value,...` parser for command line parameter strings.
//!
//! Only scalar literals are recognised: `true`/`false`, integers, finite
//! floats, quoted strings and bare words (taken as strings). Nothing is
//! evaluated.

use crate::errors::{ErrorInfo, RepError};
use crate::params::{ParamMap, ParamValue};

/// Parses a comma separated list of assignments.
pub fn parse_assignments(input: &str) -> Result<ParamMap, RepError> {
    let mut map = ParamMap::new();
    for item in split_items(input)? {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some((key, raw)) = trimmed.split_once('=') else {
            return Err(parse_error("assign-missing", "expected key=value", trimmed));
        };
        let key = key.trim();
        if !valid_key(key) {
            return Err(parse_error("assign-key", "invalid parameter name", trimmed));
        }
        let value = parse_value(raw.trim()).ok_or_else(|| {
            parse_error("assign-value", "value is not a scalar literal", trimmed)
        })?;
        if map.insert(key.to_string(), value).is_some() {
            return Err(parse_error("assign-duplicate", "parameter given twice", key));
        }
    }
    Ok(map)
}

/// Parses a single literal.
pub fn parse_value(raw: &str) -> Option<ParamValue> {
    if raw.is_empty() {
        return None;
    }
    if let Some(quoted) = unquote(raw) {
        return Some(ParamValue::Str(quoted.to_string()));
    }
    match raw {
        "true" | "True" => return Some(ParamValue::Bool(true)),
        "false" | "False" => return Some(ParamValue::Bool(false)),
        _ => {}
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Some(ParamValue::Int(int));
    }
    if looks_numeric(raw) {
        return raw
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(ParamValue::Float);
    }
    if raw.chars().all(|ch| ch.is_ascii_alphanumeric() || "_-./".contains(ch)) {
        return Some(ParamValue::Str(raw.to_string()));
    }
    None
}

fn split_items(input: &str) -> Result<Vec<&str>, RepError> {
    let mut items = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, ch) in input.char_indices() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, ',') => {
                items.push(&input[start..idx]);
                start = idx + 1;
            }
            (None, _) => {}
        }
    }
    if quote.is_some() {
        return Err(parse_error("assign-quote", "unterminated quote", input));
    }
    items.push(&input[start..]);
    Ok(items)
}

fn unquote(raw: &str) -> Option<&str> {
    let first = raw.chars().next()?;
    if (first == '\'' || first == '"') && raw.len() >= 2 && raw.ends_with(first) {
        let inner = &raw[1..raw.len() - 1];
        if !inner.contains(first) {
            return Some(inner);
        }
    }
    None
}

fn looks_numeric(raw: &str) -> bool {
    let body = raw.strip_prefix(&['-', '+'][..]).unwrap_or(raw);
    body.starts_with(|ch: char| ch.is_ascii_digit() || ch == '.')
        && body
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '-' | '+'))
}

fn valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        _ => false,
    }
}

fn parse_error(code: &str, message: &str, input: &str) -> RepError {
    RepError::Params(
        ErrorInfo::new(code, message)
            .with_context("input", input)
            .with_hint("use key=value pairs separated by commas, e.g. lambda=0.1,iterations=500"),
    )
}
