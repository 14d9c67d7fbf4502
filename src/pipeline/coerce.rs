use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Number, Value};

use super::decode::json_kind;
use super::schema::{FieldKind, FieldValue, ListStyle};

// Comma, ampersand or the standalone word "and", with surrounding whitespace.
static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:,|&|\band\b)\s*").expect("separator pattern is valid")
});

// Citation indices such as "[12, 34]" that search-grounded replies leave behind.
static CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[\d+,\s*\d+\]").expect("citation pattern is valid"));

/// Brings one observed value into the canonical shape of its declared kind.
///
/// `null` stays `Null` for every kind; whether that is acceptable is the
/// validator's call. Unrecognized shapes fall back to string coercion.
/// Object lists are validated recursively by the validator and are treated as
/// scalars here.
pub fn coerce(field_name: &str, raw: &Value, kind: &FieldKind) -> FieldValue {
    let value = match kind {
        FieldKind::Scalar | FieldKind::ObjectList(_) => coerce_scalar(raw),
        FieldKind::Number => coerce_number(raw),
        FieldKind::ScalarList(ListStyle::Tokens) => coerce_tokens(raw),
        FieldKind::ScalarList(ListStyle::Lines) => coerce_lines(raw),
    };

    if !shape_preserved(raw, &value) {
        tracing::debug!(
            field = field_name,
            observed = json_kind(raw),
            coerced = value.shape(),
            "coerced field to declared shape"
        );
    }
    value
}

pub fn coerce_scalar(raw: &Value) -> FieldValue {
    match raw {
        Value::Null => FieldValue::Null,
        Value::String(text) => FieldValue::Text(text.clone()),
        Value::Object(_) | Value::Array(_) => FieldValue::Raw(raw.to_string()),
        Value::Number(number) => FieldValue::Text(number.to_string()),
        Value::Bool(flag) => FieldValue::Text(flag.to_string()),
    }
}

// Numbers keep their JSON representation, so an integer score stays an integer.
fn coerce_number(raw: &Value) -> FieldValue {
    let parsed = match raw {
        Value::Number(number) => Some(number.clone()),
        Value::String(text) => parse_number(text.trim()),
        _ => None,
    };
    match parsed {
        Some(number) => FieldValue::Number(number),
        None => coerce_scalar(raw),
    }
}

fn parse_number(text: &str) -> Option<Number> {
    serde_json::from_str::<Number>(text)
        .ok()
        .or_else(|| text.parse::<f64>().ok().and_then(Number::from_f64))
}

fn coerce_tokens(raw: &Value) -> FieldValue {
    if raw.is_null() {
        return FieldValue::Null;
    }
    let tokens = flatten_to_strings(raw)
        .iter()
        .flat_map(|piece| split_tokens(piece))
        .collect();
    FieldValue::List(tokens)
}

fn coerce_lines(raw: &Value) -> FieldValue {
    if raw.is_null() {
        return FieldValue::Null;
    }
    let lines = flatten_to_strings(raw)
        .iter()
        .map(|line| strip_citations(line).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    FieldValue::List(lines)
}

/// Splits on commas, "&" and the word "and" (any case), trimming each token
/// and dropping empty ones.
pub fn split_tokens(text: &str) -> Vec<String> {
    SEPARATORS
        .split(text)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn strip_citations(text: &str) -> String {
    CITATION.replace_all(text, "").into_owned()
}

fn flatten_to_strings(raw: &Value) -> Vec<String> {
    match raw {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().flat_map(flatten_to_strings).collect(),
        Value::String(text) => vec![text.clone()],
        other => vec![other.to_string()],
    }
}

fn shape_preserved(raw: &Value, value: &FieldValue) -> bool {
    matches!(
        (raw, value),
        (Value::Null, FieldValue::Null)
            | (Value::String(_), FieldValue::Text(_))
            | (Value::Number(_), FieldValue::Number(_))
            | (Value::Array(_), FieldValue::List(_))
    )
}
