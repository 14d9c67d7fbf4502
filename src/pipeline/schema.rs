use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value, json};

/// How a list field treats its elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    /// Short tokens (place names, paths). Elements are split on separators.
    Tokens,
    /// Free-text lines (bullet digests). Elements stay whole and lose citation markers.
    Lines,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar,
    Number,
    ScalarList(ListStyle),
    ObjectList(RecordSchema),
}

impl FieldKind {
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Scalar => "scalar",
            FieldKind::Number => "number",
            FieldKind::ScalarList(ListStyle::Tokens) => "token list",
            FieldKind::ScalarList(ListStyle::Lines) => "line list",
            FieldKind::ObjectList(_) => "object list",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    /// Alternative keys accepted on input. Output always uses `name`.
    pub aliases: Vec<String>,
}

impl FieldSpec {
    pub fn required(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            aliases: Vec::new(),
        }
    }

    pub fn optional(name: &str, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    /// The value stored under the field's name, or else under its first
    /// matching alias.
    pub fn lookup<'a>(&self, object: &'a Map<String, Value>) -> Option<&'a Value> {
        std::iter::once(&self.name)
            .chain(&self.aliases)
            .find_map(|key| object.get(key))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl RecordSchema {
    pub fn new(name: &str, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.to_string(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    /// True when `object` carries at least one declared field.
    pub fn overlaps(&self, object: &Map<String, Value>) -> bool {
        self.fields.iter().any(|spec| spec.lookup(object).is_some())
    }

    pub fn describe(&self) -> Value {
        let fields = self
            .fields
            .iter()
            .map(|spec| {
                let mut entry = json!({
                    "name": spec.name,
                    "kind": spec.kind.label(),
                    "required": spec.required,
                });
                if !spec.aliases.is_empty() {
                    entry["aliases"] = json!(spec.aliases);
                }
                if let FieldKind::ObjectList(nested) = &spec.kind {
                    entry["items"] = nested.describe();
                }
                entry
            })
            .collect::<Vec<Value>>();
        json!({ "record": self.name, "fields": fields })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionKind {
    Records(RecordSchema),
    Lines,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionSpec {
    pub key: String,
    pub kind: SectionKind,
}

/// Envelope of one coordinator's output: a primary record section plus
/// auxiliary side tables.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestSchema {
    pub primary_key: String,
    pub primary: RecordSchema,
    pub auxiliary: Vec<SectionSpec>,
}

impl DigestSchema {
    pub fn new(primary_key: &str, primary: RecordSchema) -> Self {
        Self {
            primary_key: primary_key.to_string(),
            primary,
            auxiliary: Vec::new(),
        }
    }

    pub fn with_records(mut self, key: &str, schema: RecordSchema) -> Self {
        self.auxiliary.push(SectionSpec {
            key: key.to_string(),
            kind: SectionKind::Records(schema),
        });
        self
    }

    pub fn with_lines(mut self, key: &str) -> Self {
        self.auxiliary.push(SectionSpec {
            key: key.to_string(),
            kind: SectionKind::Lines,
        });
        self
    }

    pub fn section_keys(&self) -> Vec<&str> {
        std::iter::once(self.primary_key.as_str())
            .chain(self.auxiliary.iter().map(|section| section.key.as_str()))
            .collect()
    }

    /// Payload used when a reply cannot be decoded at all.
    pub fn empty_payload(&self) -> Map<String, Value> {
        self.section_keys()
            .into_iter()
            .map(|key| (key.to_string(), Value::Array(Vec::new())))
            .collect()
    }

    pub fn describe(&self) -> Value {
        let auxiliary = self
            .auxiliary
            .iter()
            .map(|section| match &section.kind {
                SectionKind::Records(schema) => {
                    json!({ "key": section.key, "kind": "records", "items": schema.describe() })
                }
                SectionKind::Lines => json!({ "key": section.key, "kind": "lines" }),
            })
            .collect::<Vec<Value>>();
        json!({
            "primary_key": self.primary_key,
            "primary": self.primary.describe(),
            "auxiliary": auxiliary,
        })
    }
}

/// Canonical value of one validated field.
///
/// `Raw` carries the compact JSON of a nested structure the model put where a
/// flat value was declared; it serializes as a string just like `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Raw(String),
    Number(Number),
    List(Vec<String>),
    Records(Vec<ValidatedRecord>),
    Null,
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) | FieldValue::Raw(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => value.as_f64(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn shape(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Raw(_) => "raw json",
            FieldValue::Number(_) => "number",
            FieldValue::List(_) => "list",
            FieldValue::Records(_) => "records",
            FieldValue::Null => "null",
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(text) | FieldValue::Raw(text) => serializer.serialize_str(text),
            FieldValue::Number(value) => value.serialize(serializer),
            FieldValue::List(items) => items.serialize(serializer),
            FieldValue::Records(records) => records.serialize(serializer),
            FieldValue::Null => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidatedRecord {
    fields: Vec<(String, FieldValue)>,
}

impl ValidatedRecord {
    pub(crate) fn from_fields(fields: Vec<(String, FieldValue)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for ValidatedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Records(Vec<ValidatedRecord>),
    Lines(Vec<String>),
}

impl Section {
    pub fn empty_for(kind: &SectionKind) -> Self {
        match kind {
            SectionKind::Records(_) => Section::Records(Vec::new()),
            SectionKind::Lines => Section::Lines(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Section::Records(records) => records.len(),
            Section::Lines(lines) => lines.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for Section {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Section::Records(records) => records.serialize(serializer),
            Section::Lines(lines) => lines.serialize(serializer),
        }
    }
}

/// Final response envelope: sections keyed and ordered as the schema declares.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Digest {
    sections: Vec<(String, Section)>,
}

impl Digest {
    pub(crate) fn from_sections(sections: Vec<(String, Section)>) -> Self {
        Self { sections }
    }

    pub fn section(&self, key: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, section)| section)
    }

    pub fn records(&self, key: &str) -> &[ValidatedRecord] {
        match self.section(key) {
            Some(Section::Records(records)) => records,
            _ => &[],
        }
    }

    pub fn lines(&self, key: &str) -> &[String] {
        match self.section(key) {
            Some(Section::Lines(lines)) => lines,
            _ => &[],
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(key, _)| key.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|(_, section)| section.is_empty())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for (key, section) in &self.sections {
            map.serialize_entry(key, section)?;
        }
        map.end()
    }
}
