//! Tagged field values

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Field name → value, ordered by name for stable output.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A cell value as written to or read from the remote store.
///
/// Arrays made only of strings (link sets, multi-selects) become `List`;
/// anything that does not fit the other variants is kept as raw `Json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    List(Vec<String>),
    Json(Value),
}

impl FieldValue {
    /// Values the remote store omits instead of storing explicitly.
    #[must_use]
    pub fn is_falsy_default(&self) -> bool {
        match self {
            Self::Null | Self::Bool(false) => true,
            Self::Text(text) => text.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Json(Value::Array(items)) => items.is_empty(),
            Self::Json(Value::Object(map)) => map.is_empty(),
            _ => false,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Items of a list value; `Null` reads as an empty list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            Self::Null => Some(&[]),
            _ => None,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// `Null` when the text is absent.
    pub fn optional_text(value: Option<impl Into<String>>) -> Self {
        value.map_or(Self::Null, |value| Self::Text(value.into()))
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    pub fn count(value: usize) -> Self {
        Self::Number(Number::from(u64::try_from(value).unwrap_or(u64::MAX)))
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => Self::Number(number),
            Value::String(text) => Self::Text(text),
            Value::Array(items) if items.iter().all(Value::is_string) => Self::List(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(text) => Some(text),
                        _ => None,
                    })
                    .collect(),
            ),
            other => Self::Json(other),
        }
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null => Self::Null,
            FieldValue::Bool(flag) => Self::Bool(flag),
            FieldValue::Number(number) => Self::Number(number),
            FieldValue::Text(text) => Self::String(text),
            FieldValue::List(items) => Self::Array(items.into_iter().map(Self::String).collect()),
            FieldValue::Json(raw) => raw,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Convert a raw JSON object into a field map.
pub fn field_map_from_json(map: serde_json::Map<String, Value>) -> FieldMap {
    map.into_iter()
        .map(|(name, value)| (name, FieldValue::from(value)))
        .collect()
}

/// Convert a field map into a raw JSON object.
pub fn field_map_to_json(fields: &FieldMap) -> serde_json::Map<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), Value::from(value.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_arrays_become_lists() {
        let value = FieldValue::from(json!(["rec1", "rec2"]));
        assert_eq!(value, FieldValue::list(["rec1", "rec2"]));
    }

    #[test]
    fn mixed_arrays_stay_raw() {
        let value = FieldValue::from(json!([{"id": "att1"}]));
        assert!(matches!(value, FieldValue::Json(Value::Array(_))));
    }

    #[test]
    fn empty_array_is_an_empty_list() {
        assert_eq!(FieldValue::from(json!([])), FieldValue::List(Vec::new()));
    }

    #[test]
    fn falsy_defaults() {
        assert!(FieldValue::Null.is_falsy_default());
        assert!(FieldValue::Bool(false).is_falsy_default());
        assert!(FieldValue::text("").is_falsy_default());
        assert!(FieldValue::List(Vec::new()).is_falsy_default());
        assert!(!FieldValue::Bool(true).is_falsy_default());
        assert!(!FieldValue::count(0).is_falsy_default());
        assert!(!FieldValue::text("x").is_falsy_default());
    }

    #[test]
    fn serializes_as_plain_json() {
        let mut fields = FieldMap::new();
        fields.insert("Name".to_string(), FieldValue::text("Alice"));
        fields.insert("Num Channels".to_string(), FieldValue::count(3));
        fields.insert("Role".to_string(), FieldValue::list(["Admin"]));
        let rendered = serde_json::to_value(&fields).unwrap();
        assert_eq!(
            rendered,
            json!({"Name": "Alice", "Num Channels": 3, "Role": ["Admin"]})
        );
    }

    #[test]
    fn null_reads_as_empty_list() {
        assert_eq!(FieldValue::Null.as_list(), Some(&[][..]));
        assert_eq!(FieldValue::text("x").as_list(), None);
    }
}
