//! FHIR Reference normalisation.
//!
//! Bundles produced by generators such as Synthea link entries through
//! `urn:uuid:` full URLs, while hand-written bundles use relative
//! `Type/id` references. Relational columns store the bare id in both cases.
//!
//! # Reference Formats
//!
//! - Relative: `Practitioner/123`
//! - Versioned: `Practitioner/123/_history/1`
//! - Absolute URL: `http://example.org/fhir/Practitioner/123`
//! - URN: `urn:uuid:xxx` or `urn:oid:xxx`
//! - Conditional: `Practitioner?identifier=http://hl7.org/fhir/sid/us-npi|999` (keyed on the value)
//! - Contained: `#contained-id`
//!
//! # Example
//!
//! ```
//! use fhir_ingest_core::reference::{parse_reference, reference_id};
//!
//! let r = parse_reference("Practitioner/123/_history/2").unwrap();
//! assert_eq!(r.resource_type.as_deref(), Some("Practitioner"));
//! assert_eq!(r.id, "123");
//!
//! assert_eq!(reference_id("urn:uuid:a1b2").as_deref(), Some("a1b2"));
//! ```

use std::fmt;

/// A parsed reference, reduced to the parts the importer stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FhirReference {
    /// Resource type, when the reference names one (`urn:` references do not)
    pub resource_type: Option<String>,
    pub id: String,
}

impl FhirReference {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: Some(resource_type.into()),
            id: id.into(),
        }
    }

    pub fn untyped(id: impl Into<String>) -> Self {
        Self {
            resource_type: None,
            id: id.into(),
        }
    }
}

impl fmt::Display for FhirReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource_type {
            Some(rt) => write!(f, "{}/{}", rt, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Parse a FHIR reference string.
///
/// Returns `None` for empty, contained (`#id`) and malformed references.
pub fn parse_reference(reference: &str) -> Option<FhirReference> {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    if let Some(urn) = reference.strip_prefix("urn:") {
        // urn:uuid:<id>, urn:oid:<id>
        let (_, id) = urn.split_once(':')?;
        return (!id.is_empty()).then(|| FhirReference::untyped(id));
    }

    // Conditional reference: Type?identifier=system|value keys on the value
    if let Some((resource_type, query)) = reference.split_once('?')
        && !resource_type.contains('/')
    {
        if !resource_type.starts_with(|c: char| c.is_ascii_uppercase()) {
            return None;
        }
        let criterion = query.split('&').next()?;
        let (_, value) = criterion.split_once('=')?;
        let id = value.rsplit('|').next()?;
        return (!id.is_empty()).then(|| FhirReference::new(resource_type, id));
    }

    // Absolute URLs keep only the trailing Type/id[/_history/v] part
    let path = match reference.split_once("://") {
        Some((_, rest)) => rest,
        None => reference,
    };

    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let (type_pos, id_pos) = match parts.iter().position(|p| *p == "_history") {
        Some(history) if history >= 2 => (history - 2, history - 1),
        Some(_) => return None,
        None if parts.len() >= 2 => (parts.len() - 2, parts.len() - 1),
        None => return None,
    };

    let resource_type = parts[type_pos];
    if !resource_type
        .chars()
        .next()
        .map(|c| c.is_ascii_uppercase())
        .unwrap_or(false)
    {
        return None;
    }

    Some(FhirReference::new(resource_type, parts[id_pos]))
}

/// Bare id of a reference, if it can be parsed.
pub fn reference_id(reference: &str) -> Option<String> {
    parse_reference(reference).map(|r| r.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_reference() {
        let r = parse_reference("Practitioner/123").unwrap();
        assert_eq!(r.resource_type.as_deref(), Some("Practitioner"));
        assert_eq!(r.id, "123");
        assert_eq!(r.to_string(), "Practitioner/123");
    }

    #[test]
    fn test_versioned_reference() {
        let r = parse_reference("Encounter/e-9/_history/4").unwrap();
        assert_eq!(r.resource_type.as_deref(), Some("Encounter"));
        assert_eq!(r.id, "e-9");
    }

    #[test]
    fn test_absolute_url_reference() {
        let r = parse_reference("https://example.org/fhir/Practitioner/abc").unwrap();
        assert_eq!(r, FhirReference::new("Practitioner", "abc"));
    }

    #[test]
    fn test_urn_uuid_reference() {
        let r = parse_reference("urn:uuid:550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(r.resource_type, None);
        assert_eq!(r.id, "550e8400-e29b-41d4-a716-446655440000");
        assert_eq!(r.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn test_unusable_references() {
        assert_eq!(parse_reference(""), None);
        assert_eq!(parse_reference("   "), None);
        assert_eq!(parse_reference("#contained"), None);
        assert_eq!(parse_reference("urn:uuid:"), None);
        assert_eq!(parse_reference("Patient123"), None);
        assert_eq!(parse_reference("patient/123"), None);
        assert_eq!(parse_reference("_history/2"), None);
    }

    #[test]
    fn test_conditional_reference() {
        let r = parse_reference("Practitioner?identifier=http://hl7.org/fhir/sid/us-npi|9999967591")
            .unwrap();
        assert_eq!(r, FhirReference::new("Practitioner", "9999967591"));

        let r = parse_reference("Organization?identifier=abc").unwrap();
        assert_eq!(r.id, "abc");

        assert_eq!(parse_reference("Organization?name="), None);
        assert_eq!(parse_reference("organization?identifier=abc"), None);
    }

    #[test]
    fn test_reference_id() {
        assert_eq!(reference_id("Encounter/E1").as_deref(), Some("E1"));
        assert_eq!(reference_id("urn:oid:1.2.3").as_deref(), Some("1.2.3"));
        assert_eq!(reference_id("#x"), None);
    }
}
