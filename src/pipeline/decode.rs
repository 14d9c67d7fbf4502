use serde_json::{Map, Value};

use super::schema::DigestSchema;

/// Upper bound on how much offending text a decode warning carries.
pub const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: Value,
    pub ok: bool,
}

impl Decoded {
    fn fallback() -> Self {
        Self {
            value: Value::Array(Vec::new()),
            ok: false,
        }
    }
}

/// Parses a sanitized reply as JSON.
///
/// Anything that is not JSON as a whole, including a payload wrapped in a
/// sentence, yields an empty array with `ok = false`. This never fails.
pub fn decode(text: &str) -> Decoded {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Decoded { value, ok: true },
        Err(err) => {
            tracing::warn!(
                error = %err,
                excerpt = %excerpt(text, EXCERPT_CHARS),
                "model reply is not valid JSON; using empty payload"
            );
            Decoded::fallback()
        }
    }
}

/// Fits a decoded value into the schema's envelope.
///
/// - an object carrying any declared section key is kept as is;
/// - a bare array is wrapped under the primary key;
/// - an object that looks like a single primary record is wrapped as a
///   one-element array under the primary key;
/// - an object with a single undeclared key holding an array has that array
///   moved under the primary key;
/// - anything else becomes an empty envelope.
///
/// Every declared section key is present in the result.
pub fn shape_envelope(value: Value, schema: &DigestSchema) -> Map<String, Value> {
    let declared = schema.section_keys();
    let mut envelope = match value {
        Value::Object(map) if declared.iter().any(|key| map.contains_key(*key)) => map,
        Value::Array(items) => single_entry(&schema.primary_key, Value::Array(items)),
        Value::Object(map) if schema.primary.overlaps(&map) => {
            single_entry(&schema.primary_key, Value::Array(vec![Value::Object(map)]))
        }
        Value::Object(map) if map.len() == 1 && map.values().all(Value::is_array) => {
            let (found_key, items) = map.into_iter().next().unwrap_or_default();
            tracing::debug!(
                found_key = %found_key,
                primary_key = %schema.primary_key,
                "re-keyed unexpected reply envelope"
            );
            single_entry(&schema.primary_key, items)
        }
        other => {
            if !is_empty_value(&other) {
                tracing::warn!(
                    primary_key = %schema.primary_key,
                    shape = json_kind(&other),
                    "reply does not match the digest envelope; discarding it"
                );
            }
            Map::new()
        }
    };

    for key in declared {
        envelope
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
    }
    envelope
}

fn single_entry(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::schema::{FieldKind, FieldSpec, RecordSchema};
    use serde_json::json;

    fn outage_schema() -> DigestSchema {
        DigestSchema::new(
            "outage_summary",
            RecordSchema::new(
                "outage",
                vec![
                    FieldSpec::required("reason", FieldKind::Scalar),
                    FieldSpec::optional("end_time", FieldKind::Scalar),
                ],
            ),
        )
        .with_lines("notes")
    }

    #[test]
    fn valid_json_decodes_verbatim() {
        for text in ["[1, 2, 3]", "{\"a\": {\"b\": null}}", "42", "\"text\"", "null"] {
            let decoded = decode(text);
            assert!(decoded.ok, "{text} should decode");
            assert_eq!(
                decoded.value,
                serde_json::from_str::<Value>(text).expect("fixture is valid json")
            );
        }
    }

    #[test]
    fn non_json_falls_back_to_empty_array() {
        for text in ["Sorry, I cannot comply.", "", "{not json", "[1, 2", "} backwards {"] {
            let decoded = decode(text);
            assert!(!decoded.ok, "{text:?} should not decode");
            assert_eq!(decoded.value, json!([]));
        }
    }

    #[test]
    fn json_wrapped_in_prose_is_not_json() {
        for text in [
            "Here you go: {\"outage_summary\": []} Hope this helps.",
            "Results: [{\"reason\": \"x\"}].",
            "Sorry, I cannot comply. [1, 2]",
        ] {
            let decoded = decode(text);
            assert!(!decoded.ok, "{text:?} should not decode");
            assert_eq!(decoded.value, json!([]));
        }
    }

    #[test]
    fn bare_array_is_wrapped_under_primary_key() {
        let envelope = shape_envelope(json!([{"reason": "a"}]), &outage_schema());
        assert_eq!(envelope["outage_summary"], json!([{"reason": "a"}]));
        assert_eq!(envelope["notes"], json!([]));
    }

    #[test]
    fn lone_record_is_wrapped_as_one_element_array() {
        let envelope = shape_envelope(json!({"reason": "storm"}), &outage_schema());
        assert_eq!(envelope["outage_summary"], json!([{"reason": "storm"}]));
    }

    #[test]
    fn single_unexpected_key_is_rekeyed() {
        let envelope = shape_envelope(json!({"records": [{"reason": "a"}]}), &outage_schema());
        assert_eq!(envelope["outage_summary"], json!([{"reason": "a"}]));
        assert!(!envelope.contains_key("records"));
    }

    #[test]
    fn matching_envelope_is_kept_and_completed() {
        let envelope = shape_envelope(json!({"notes": ["x"]}), &outage_schema());
        assert_eq!(envelope["notes"], json!(["x"]));
        assert_eq!(envelope["outage_summary"], json!([]));
    }

    #[test]
    fn scalars_become_empty_envelope() {
        let envelope = shape_envelope(json!("nothing useful"), &outage_schema());
        assert_eq!(envelope, outage_schema().empty_payload());
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("ಬೆಂಗಳೂರು", 3), "ಬೆಂ…");
        assert_eq!(excerpt("short", 10), "short");
    }
}
