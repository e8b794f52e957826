//! Stored and desired record model

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::{field_map_from_json, FieldMap, FieldValue};

/// Field holding the source system's stable business key.
pub const DOMAIN_ID_FIELD: &str = "Id";

/// Opaque identifier assigned by the remote store on creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(pub String);

impl RemoteId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record as the remote store currently holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRecord")]
pub struct StoredRecord {
    pub remote_id: RemoteId,
    /// `None` when the record has no `Id` field; such records never match.
    pub domain_id: Option<String>,
    pub fields: FieldMap,
}

impl StoredRecord {
    pub fn new(remote_id: RemoteId, fields: FieldMap) -> Self {
        let domain_id = domain_id_of(&fields);
        Self {
            remote_id,
            domain_id,
            fields,
        }
    }
}

/// Wire shape of a record (`{"id": ..., "fields": {...}}`).
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(alias = "remote_id")]
    id: RemoteId,
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
}

impl From<RawRecord> for StoredRecord {
    fn from(raw: RawRecord) -> Self {
        Self::new(raw.id, field_map_from_json(raw.fields))
    }
}

/// A record the source of truth wants the remote table to contain.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredRecord {
    pub domain_id: String,
    pub fields: FieldMap,
}

impl DesiredRecord {
    /// Build a desired record, writing the domain id into its `Id` field.
    pub fn new(domain_id: impl Into<String>, mut fields: FieldMap) -> Self {
        let domain_id = domain_id.into();
        fields.insert(
            DOMAIN_ID_FIELD.to_string(),
            FieldValue::Text(domain_id.clone()),
        );
        Self { domain_id, fields }
    }

    /// Build a desired record from a field map that already carries `Id`.
    pub fn from_fields(fields: FieldMap) -> Option<Self> {
        let domain_id = domain_id_of(&fields)?;
        Some(Self { domain_id, fields })
    }
}

fn domain_id_of(fields: &FieldMap) -> Option<String> {
    fields
        .get(DOMAIN_ID_FIELD)
        .and_then(FieldValue::as_text)
        .filter(|id| !id.is_empty())
        .map(ToOwned::to_owned)
}
