//! Field and table schema model

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a remote table column.
///
/// Serialized with the remote store's type names (`singleLineText`,
/// `multipleRecordLinks`, ...). Kinds the engine has no special handling for
/// are carried verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    SingleLineText,
    MultilineText,
    Email,
    Number,
    Checkbox,
    Date,
    DateTime,
    MultipleRecordLinks,
    MultipleSelects,
    SingleSelect,
    Other(String),
}

impl FieldType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::SingleLineText => "singleLineText",
            Self::MultilineText => "multilineText",
            Self::Email => "email",
            Self::Number => "number",
            Self::Checkbox => "checkbox",
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::MultipleRecordLinks => "multipleRecordLinks",
            Self::MultipleSelects => "multipleSelects",
            Self::SingleSelect => "singleSelect",
            Self::Other(name) => name,
        }
    }

    /// Date-like kinds whose stored values may carry a millisecond suffix.
    #[must_use]
    pub const fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::DateTime)
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "singleLineText" => Self::SingleLineText,
            "multilineText" => Self::MultilineText,
            "email" => Self::Email,
            "number" => Self::Number,
            "checkbox" => Self::Checkbox,
            "date" => Self::Date,
            "dateTime" => Self::DateTime,
            "multipleRecordLinks" => Self::MultipleRecordLinks,
            "multipleSelects" => Self::MultipleSelects,
            "singleSelect" => Self::SingleSelect,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for FieldType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column as reported by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Remote field identifier
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// A column the mirror wants to exist.
///
/// `options` is passed through to the remote store untouched; some kinds
/// (checkbox, dateTime, links) cannot be created without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            options: None,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = Some(options);
        self
    }
}

/// Identifier assigned to a table by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(pub String);

impl TableId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One remote table and its ordered columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub id: TableId,
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

impl TableSchema {
    /// Look up a column by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Declared type of a column, `Other("")` when the column is unknown.
    #[must_use]
    pub fn field_type(&self, name: &str) -> FieldType {
        self.field(name)
            .map_or_else(|| FieldType::Other(String::new()), |field| field.field_type.clone())
    }

    /// Specs from `desired` that have no column of the same name yet.
    #[must_use]
    pub fn missing_fields<'a>(&self, desired: &'a [FieldSpec]) -> Vec<&'a FieldSpec> {
        desired
            .iter()
            .filter(|spec| self.field(&spec.name).is_none())
            .collect()
    }

    /// Append a newly created column. Columns are never removed.
    pub fn push_field(&mut self, field: FieldSchema) {
        if self.field(&field.name).is_none() {
            self.fields.push(field);
        }
    }
}
