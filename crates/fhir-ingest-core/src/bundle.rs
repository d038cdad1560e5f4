//! Bundle decoding.
//!
//! A bundle file is decoded once into an ordered list of [`BundleEntry`]
//! values. Each entry carries a [`Resource`], a tagged union over the kinds
//! the importer routes, with the raw JSON payload kept for the mappers.
//! Entry order is preserved exactly as found in the file.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::DecodeError;
use crate::fhir::ResourceKind;

/// A decoded FHIR `Bundle` document.
#[derive(Debug, Clone)]
pub struct Bundle {
    /// `Bundle.id`, if present
    pub id: Option<String>,
    /// `Bundle.type` (`collection`, `transaction`, ...), if present
    pub bundle_type: Option<String>,
    /// Entries in file order
    pub entries: Vec<BundleEntry>,
}

/// One `Bundle.entry` element.
#[derive(Debug, Clone)]
pub struct BundleEntry {
    /// Zero-based position in `Bundle.entry`
    pub index: usize,
    /// `Bundle.entry.fullUrl`, if present
    pub full_url: Option<String>,
    pub resource: Resource,
}

/// A resource payload tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Patient(Value),
    Encounter(Value),
    Observation(Value),
    Condition(Value),
    Other { resource_type: String, payload: Value },
}

impl Bundle {
    /// Decodes raw file content.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Decodes an already parsed JSON document.
    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        let Value::Object(mut doc) = value else {
            return Err(DecodeError::NotAnObject);
        };

        let resource_type = doc
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingResourceType)?;
        if resource_type != "Bundle" {
            return Err(DecodeError::not_a_bundle(resource_type));
        }

        let id = string_field(&doc, "id");
        let bundle_type = string_field(&doc, "type");

        let entries = match doc.remove("entry") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| BundleEntry::from_value(index, item))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(DecodeError::InvalidEntryList),
        };

        debug!(
            bundle_id = id.as_deref().unwrap_or("-"),
            bundle_type = bundle_type.as_deref().unwrap_or("-"),
            entries = entries.len(),
            "Bundle decoded"
        );

        Ok(Self {
            id,
            bundle_type,
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BundleEntry {
    fn from_value(index: usize, value: Value) -> Result<Self, DecodeError> {
        let Value::Object(mut entry) = value else {
            return Err(DecodeError::MissingEntryResource { index });
        };

        let full_url = string_field(&entry, "fullUrl");
        let payload = match entry.remove("resource") {
            Some(payload @ Value::Object(_)) => payload,
            _ => return Err(DecodeError::MissingEntryResource { index }),
        };
        let resource = Resource::from_payload(payload)
            .ok_or(DecodeError::MissingEntryResourceType { index })?;

        Ok(Self {
            index,
            full_url,
            resource,
        })
    }
}

impl Resource {
    /// Tags a resource payload by its `resourceType`.
    ///
    /// Returns `None` when `resourceType` is absent or not a string.
    pub fn from_payload(payload: Value) -> Option<Self> {
        let resource_type = payload.get("resourceType")?.as_str()?.to_string();
        let resource = match resource_type.parse::<ResourceKind>() {
            Ok(ResourceKind::Patient) => Self::Patient(payload),
            Ok(ResourceKind::Encounter) => Self::Encounter(payload),
            Ok(ResourceKind::Observation) => Self::Observation(payload),
            Ok(ResourceKind::Condition) => Self::Condition(payload),
            _ => Self::Other {
                resource_type,
                payload,
            },
        };
        Some(resource)
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Patient(_) => ResourceKind::Patient,
            Self::Encounter(_) => ResourceKind::Encounter,
            Self::Observation(_) => ResourceKind::Observation,
            Self::Condition(_) => ResourceKind::Condition,
            Self::Other { resource_type, .. } => ResourceKind::Other(resource_type.clone()),
        }
    }

    pub fn payload(&self) -> &Value {
        match self {
            Self::Patient(payload)
            | Self::Encounter(payload)
            | Self::Observation(payload)
            | Self::Condition(payload)
            | Self::Other { payload, .. } => payload,
        }
    }

    /// `Resource.id`, if present and a string
    pub fn id(&self) -> Option<&str> {
        self.payload().get("id").and_then(Value::as_str)
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}
