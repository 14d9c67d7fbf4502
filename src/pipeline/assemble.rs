use std::collections::BTreeMap;

use super::schema::{Digest, DigestSchema, Section, ValidatedRecord};

/// Builds the response envelope: primary records first, then every declared
/// auxiliary section in schema order (empty when not supplied), then any
/// undeclared sections sorted by key.
pub fn assemble(
    schema: &DigestSchema,
    primary: Vec<ValidatedRecord>,
    mut auxiliary: BTreeMap<String, Section>,
) -> Digest {
    if auxiliary.remove(&schema.primary_key).is_some() {
        tracing::debug!(
            key = %schema.primary_key,
            "ignoring auxiliary section that shadows the primary key"
        );
    }

    let mut sections = Vec::with_capacity(1 + schema.auxiliary.len() + auxiliary.len());
    sections.push((schema.primary_key.clone(), Section::Records(primary)));
    for spec in &schema.auxiliary {
        let section = auxiliary
            .remove(&spec.key)
            .unwrap_or_else(|| Section::empty_for(&spec.kind));
        sections.push((spec.key.clone(), section));
    }
    sections.extend(auxiliary);

    Digest::from_sections(sections)
}
