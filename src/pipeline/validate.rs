use serde_json::Value;

use super::coerce::{coerce, coerce_scalar};
use super::decode::json_kind;
use super::schema::{FieldKind, FieldSpec, FieldValue, RecordSchema, ValidatedRecord};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("record is a {found}, not an object")]
    NotAnObject { found: &'static str },
    #[error("required field '{field}' is missing or null")]
    MissingField { field: String },
    #[error("field '{field}' should be a {expected} but coerced to {found}")]
    WrongShape {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub index: usize,
    pub record: Value,
    pub reason: RecordError,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationOutcome {
    pub accepted: Vec<ValidatedRecord>,
    pub rejected: Vec<Rejection>,
}

/// Best-effort batch validation.
///
/// Each record is coerced field by field and checked against `schema`. Records
/// that still fail are dropped with a warning; the rest keep their input order.
pub fn validate(records: &[Value], schema: &RecordSchema) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    for (index, record) in records.iter().enumerate() {
        match validate_record(record, schema) {
            Ok(validated) => outcome.accepted.push(validated),
            Err(reason) => {
                tracing::warn!(
                    schema = %schema.name,
                    index,
                    record = %record,
                    reason = %reason,
                    "dropping invalid record"
                );
                outcome.rejected.push(Rejection {
                    index,
                    record: record.clone(),
                    reason,
                });
            }
        }
    }

    outcome
}

pub fn validate_record(record: &Value, schema: &RecordSchema) -> Result<ValidatedRecord, RecordError> {
    let Value::Object(object) = unwrap_single_key(record, schema) else {
        return Err(RecordError::NotAnObject {
            found: json_kind(record),
        });
    };

    let mut fields = Vec::with_capacity(schema.fields.len());
    for spec in &schema.fields {
        let raw = spec.lookup(object).unwrap_or(&Value::Null);
        let value = match &spec.kind {
            FieldKind::ObjectList(nested) => coerce_object_list(raw, nested),
            kind => coerce(&spec.name, raw, kind),
        };

        if value.is_null() {
            if spec.required {
                return Err(RecordError::MissingField {
                    field: spec.name.clone(),
                });
            }
        } else {
            check_shape(spec, &value)?;
        }
        fields.push((spec.name.clone(), value));
    }

    Ok(ValidatedRecord::from_fields(fields))
}

// `{"weather_summary": {"location": ..}}` stands for the inner object when only
// the inner one carries declared fields.
fn unwrap_single_key<'a>(record: &'a Value, schema: &RecordSchema) -> &'a Value {
    let Value::Object(outer) = record else {
        return record;
    };
    if outer.len() != 1 || schema.overlaps(outer) {
        return record;
    }
    match outer.values().next() {
        Some(inner @ Value::Object(fields)) if schema.overlaps(fields) => inner,
        _ => record,
    }
}

fn coerce_object_list(raw: &Value, nested: &RecordSchema) -> FieldValue {
    match raw {
        Value::Null => FieldValue::Null,
        Value::Array(items) => FieldValue::Records(validate(items, nested).accepted),
        Value::Object(_) => {
            FieldValue::Records(validate(std::slice::from_ref(raw), nested).accepted)
        }
        other => coerce_scalar(other),
    }
}

fn check_shape(spec: &FieldSpec, value: &FieldValue) -> Result<(), RecordError> {
    let matches = match spec.kind {
        FieldKind::Scalar => matches!(value, FieldValue::Text(_) | FieldValue::Raw(_)),
        FieldKind::Number => matches!(value, FieldValue::Number(_)),
        FieldKind::ScalarList(_) => matches!(value, FieldValue::List(_)),
        FieldKind::ObjectList(_) => matches!(value, FieldValue::Records(_)),
    };
    if matches {
        return Ok(());
    }
    Err(RecordError::WrongShape {
        field: spec.name.clone(),
        expected: spec.kind.label(),
        found: value.shape(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::schema::ListStyle;
    use serde_json::json;

    fn outage_schema() -> RecordSchema {
        RecordSchema::new(
            "outage",
            vec![
                FieldSpec::required("locations", FieldKind::ScalarList(ListStyle::Tokens)),
                FieldSpec::required("start_time", FieldKind::Scalar),
                FieldSpec::optional("end_time", FieldKind::Scalar),
                FieldSpec::required("reason", FieldKind::Scalar),
            ],
        )
    }

    #[test]
    fn invalid_records_are_dropped_and_order_is_kept() {
        let records = vec![
            json!({"locations": "Indiranagar", "start_time": "10:00", "reason": "Maintenance"}),
            json!({"locations": ["HSR"], "reason": "no start time"}),
            json!("not a record"),
            json!({"locations": ["Jayanagar and BTM"], "start_time": "11:00", "end_time": null, "reason": "Tree fall"}),
            json!({"locations": ["Hebbal"], "start_time": null, "reason": "Feeder fault"}),
        ];

        let outcome = validate(&records, &outage_schema());

        assert_eq!(outcome.accepted.len(), 2);
        assert_eq!(outcome.rejected.len(), 3);
        assert_eq!(
            outcome.accepted[0].get("reason").and_then(FieldValue::as_str),
            Some("Maintenance")
        );
        assert_eq!(
            outcome.accepted[1].get("locations").and_then(FieldValue::as_list),
            Some(&["Jayanagar".to_string(), "BTM".to_string()][..])
        );
        assert_eq!(
            outcome.rejected.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![1, 2, 4]
        );
        assert_eq!(
            outcome.rejected[0].reason,
            RecordError::MissingField {
                field: "start_time".to_string()
            }
        );
        assert_eq!(
            outcome.rejected[1].reason,
            RecordError::NotAnObject { found: "string" }
        );
    }

    #[test]
    fn optional_fields_default_to_null_and_extras_are_ignored() {
        let record = json!({
            "locations": ["Indiranagar"],
            "start_time": "10:00",
            "reason": "Maintenance",
            "source": "bescom.co.in"
        });
        let validated = validate_record(&record, &outage_schema()).expect("record is valid");
        assert_eq!(validated.get("end_time"), Some(&FieldValue::Null));
        assert!(validated.get("source").is_none());
        assert_eq!(validated.len(), 4);
    }

    #[test]
    fn aliased_key_fills_the_declared_field() {
        let schema = RecordSchema::new(
            "outage",
            vec![
                FieldSpec::required("locations", FieldKind::ScalarList(ListStyle::Tokens))
                    .with_alias("location"),
                FieldSpec::required("reason", FieldKind::Scalar),
            ],
        );
        let validated = validate_record(
            &json!({"location": "Koramangala 4th Block", "reason": "Fault"}),
            &schema,
        )
        .expect("alias satisfies the required field");
        assert_eq!(
            validated.get("locations").and_then(FieldValue::as_list),
            Some(&["Koramangala 4th Block".to_string()][..])
        );
    }

    #[test]
    fn unparseable_number_is_a_shape_error() {
        let schema = RecordSchema::new(
            "pothole",
            vec![
                FieldSpec::required("location", FieldKind::Scalar),
                FieldSpec::optional("clarity_score", FieldKind::Number),
            ],
        );
        let err = validate_record(&json!({"location": "x", "clarity_score": "blurry"}), &schema)
            .expect_err("non-numeric score must fail");
        assert_eq!(
            err,
            RecordError::WrongShape {
                field: "clarity_score".to_string(),
                expected: "number",
                found: "text",
            }
        );
    }

    #[test]
    fn nested_object_lists_drop_only_the_bad_items() {
        let schema = RecordSchema::new(
            "area",
            vec![
                FieldSpec::required("name", FieldKind::Scalar),
                FieldSpec::optional(
                    "closures",
                    FieldKind::ObjectList(RecordSchema::new(
                        "closure",
                        vec![FieldSpec::required("road", FieldKind::Scalar)],
                    )),
                ),
            ],
        );
        let record = json!({
            "name": "Koramangala",
            "closures": [{"road": "80 Feet Road"}, {"lane": "missing road"}]
        });

        let validated = validate_record(&record, &schema).expect("parent survives");
        let Some(FieldValue::Records(closures)) = validated.get("closures") else {
            panic!("closures should be records");
        };
        assert_eq!(closures.len(), 1);

        let err = validate_record(&json!({"name": "x", "closures": "none"}), &schema)
            .expect_err("string is not an object list");
        assert!(matches!(err, RecordError::WrongShape { .. }));
    }

    #[test]
    fn single_key_wrapper_is_unwrapped() {
        let schema = RecordSchema::new(
            "weather",
            vec![
                FieldSpec::required("location", FieldKind::Scalar),
                FieldSpec::optional("temperature", FieldKind::Scalar),
            ],
        );
        let validated = validate_record(
            &json!({"weather_summary": {"location": "Koramangala", "temperature": "28 °C"}}),
            &schema,
        )
        .expect("wrapped record is valid");
        assert_eq!(
            validated.get("location").and_then(FieldValue::as_str),
            Some("Koramangala")
        );
    }

    #[test]
    fn scalar_field_holding_object_survives_as_raw_json() {
        let schema = RecordSchema::new(
            "weather",
            vec![
                FieldSpec::required("location", FieldKind::Scalar),
                FieldSpec::optional("wind", FieldKind::Scalar),
            ],
        );
        let validated = validate_record(
            &json!({"location": "Hebbal", "wind": {"speed": 12, "unit": "km/h"}}),
            &schema,
        )
        .expect("record is valid");
        assert_eq!(
            validated.get("wind"),
            Some(&FieldValue::Raw("{\"speed\":12,\"unit\":\"km/h\"}".to_string()))
        );
    }
}
