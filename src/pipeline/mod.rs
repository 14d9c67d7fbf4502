//! Reconciliation of free-form model replies into validated digests:
//! sanitize → decode → coerce → validate → assemble.

pub mod assemble;
pub mod coerce;
pub mod decode;
pub mod sanitize;
pub mod schema;
pub mod validate;

use std::collections::BTreeMap;

use serde_json::Value;

pub use assemble::assemble;
pub use coerce::{coerce, split_tokens, strip_citations};
pub use decode::{Decoded, EXCERPT_CHARS, decode, excerpt, shape_envelope};
pub use sanitize::{has_fence, sanitize};
pub use schema::{
    Digest, DigestSchema, FieldKind, FieldSpec, FieldValue, ListStyle, RecordSchema, Section,
    SectionKind, ValidatedRecord,
};
pub use validate::{RecordError, Rejection, ValidationOutcome, validate, validate_record};

use crate::trail::{ResponseTrail, TrailEntry};

/// Runs a raw reply through the whole pipeline. Never fails: undecodable or
/// fully invalid replies yield a digest with empty sections.
pub fn normalize_reply(raw: &str, schema: &DigestSchema, trail: &mut ResponseTrail) -> Digest {
    let text = sanitize(raw);
    tracing::debug!(
        fenced = has_fence(raw),
        raw_chars = raw.len(),
        payload_chars = text.len(),
        "sanitized reply"
    );
    let decoded = decode(&text);
    if !decoded.ok {
        trail.record(TrailEntry::DecodeFailed {
            excerpt: excerpt(&text, EXCERPT_CHARS),
        });
    }

    let mut envelope = shape_envelope(decoded.value, schema);

    let primary_items = section_items(envelope.remove(&schema.primary_key));
    let primary = validate(&primary_items, &schema.primary);
    record_rejections(trail, &schema.primary_key, &primary.rejected);

    let mut auxiliary = BTreeMap::new();
    for spec in &schema.auxiliary {
        let items = section_items(envelope.remove(&spec.key));
        let section = match &spec.kind {
            SectionKind::Records(record_schema) => {
                let outcome = validate(&items, record_schema);
                record_rejections(trail, &spec.key, &outcome.rejected);
                Section::Records(outcome.accepted)
            }
            SectionKind::Lines => Section::Lines(line_items(&spec.key, Value::Array(items))),
        };
        auxiliary.insert(spec.key.clone(), section);
    }
    for (key, value) in envelope {
        tracing::debug!(section = %key, "keeping undeclared section as lines");
        let section = Section::Lines(line_items(&key, value));
        auxiliary.insert(key, section);
    }

    let digest = assemble(schema, primary.accepted, auxiliary);
    tracing::debug!(
        primary_key = %schema.primary_key,
        records = digest.records(&schema.primary_key).len(),
        "assembled digest"
    );
    digest
}

// A section's items. A section given as a string is decoded once more, since
// models sometimes return the JSON array as an escaped string.
fn section_items(value: Option<Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(Value::String(text)) => {
            let inner = sanitize(&text);
            match serde_json::from_str::<Value>(&inner) {
                Ok(Value::Array(items)) => items,
                Ok(object @ Value::Object(_)) => vec![object],
                _ => vec![Value::String(text)],
            }
        }
        Some(other) => vec![other],
    }
}

fn line_items(key: &str, value: Value) -> Vec<String> {
    coerce(key, &value, &FieldKind::ScalarList(ListStyle::Lines))
        .as_list()
        .map(<[String]>::to_vec)
        .unwrap_or_default()
}

fn record_rejections(trail: &mut ResponseTrail, section: &str, rejected: &[Rejection]) {
    for rejection in rejected {
        trail.record(TrailEntry::RecordDropped {
            section: section.to_string(),
            index: rejection.index,
            record: rejection.record.clone(),
            reason: rejection.reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn energy_schema() -> DigestSchema {
        DigestSchema::new(
            "outage_summary",
            RecordSchema::new(
                "outage",
                vec![
                    FieldSpec::required("location", FieldKind::ScalarList(ListStyle::Tokens)),
                    FieldSpec::required("start_time", FieldKind::Scalar),
                    FieldSpec::optional("end_time", FieldKind::Scalar),
                    FieldSpec::required("reason", FieldKind::Scalar),
                ],
            ),
        )
    }

    #[test]
    fn fenced_reply_yields_one_record() {
        let raw = "```json\n[{\"location\":[\"Indiranagar\"],\"start_time\":\"2025-07-22T10:00:00+05:30\",\"end_time\":null,\"reason\":\"Maintenance\"}]\n```";
        let mut trail = ResponseTrail::new();

        let digest = normalize_reply(raw, &energy_schema(), &mut trail);

        let records = digest.records("outage_summary");
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].get("location").and_then(FieldValue::as_list),
            Some(&["Indiranagar".to_string()][..])
        );
        assert_eq!(records[0].get("end_time"), Some(&FieldValue::Null));
        assert!(trail.is_empty());
        assert_eq!(
            serde_json::to_value(&digest).expect("digest serializes"),
            json!({
                "outage_summary": [{
                    "location": ["Indiranagar"],
                    "start_time": "2025-07-22T10:00:00+05:30",
                    "end_time": null,
                    "reason": "Maintenance"
                }]
            })
        );
    }

    #[test]
    fn refusal_yields_empty_digest() {
        let mut trail = ResponseTrail::new();
        let digest = normalize_reply("Sorry, I cannot comply.", &energy_schema(), &mut trail);

        assert!(digest.is_empty());
        assert_eq!(
            serde_json::to_value(&digest).expect("digest serializes"),
            json!({"outage_summary": []})
        );
        assert_eq!(trail.decode_failures(), 1);
    }

    #[test]
    fn trailing_citation_is_not_mistaken_for_a_payload() {
        let mut trail = ResponseTrail::new();
        let digest = normalize_reply(
            "Sorry, I cannot comply. [1, 2]",
            &energy_schema(),
            &mut trail,
        );

        assert!(digest.is_empty());
        assert_eq!(trail.decode_failures(), 1);
        assert_eq!(trail.dropped_records(), 0);
    }

    #[test]
    fn undeclared_sections_are_kept_after_declared_ones() {
        let raw = r#"{
            "zone_notes": ["Feeder F12 [3, 4]", {"ward": 150}],
            "outage_summary": [{"location": "Jayanagar", "start_time": "11:00", "reason": "Tree fall"}],
            "advisories": "Keep inverters charged"
        }"#;
        let mut trail = ResponseTrail::new();

        let digest = normalize_reply(raw, &energy_schema(), &mut trail);

        assert_eq!(
            digest.keys().collect::<Vec<_>>(),
            vec!["outage_summary", "advisories", "zone_notes"]
        );
        assert_eq!(digest.records("outage_summary").len(), 1);
        assert_eq!(
            digest.lines("zone_notes"),
            ["Feeder F12".to_string(), "{\"ward\":150}".to_string()]
        );
        assert_eq!(digest.lines("advisories"), ["Keep inverters charged".to_string()]);
        assert!(trail.is_empty());
    }

    #[test]
    fn dropped_records_are_traced() {
        let raw = r#"{"outage_summary": [
            {"location": "HSR Layout & Bellandur", "start_time": "09:00", "reason": "Upgrade"},
            {"location": "Hebbal", "reason": "no start"}
        ]}"#;
        let mut trail = ResponseTrail::new();

        let digest = normalize_reply(raw, &energy_schema(), &mut trail);

        assert_eq!(digest.records("outage_summary").len(), 1);
        assert_eq!(trail.dropped_records(), 1);
    }

    #[test]
    fn section_given_as_json_string_is_decoded() {
        let raw = r#"{"outage_summary": "[{\"location\": \"Whitefield\", \"start_time\": \"10:00\", \"reason\": \"Cable fault\"}]"}"#;
        let mut trail = ResponseTrail::new();

        let digest = normalize_reply(raw, &energy_schema(), &mut trail);

        assert_eq!(digest.records("outage_summary").len(), 1);
    }
}
