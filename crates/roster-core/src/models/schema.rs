//! Desired schema for the mirrored tables

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::field::{FieldSpec, FieldType};
use crate::{Error, Result};

pub const USERS_TABLE: &str = "Users";
pub const CHANNELS_TABLE: &str = "Channels";
pub const TASKS_TABLE: &str = "Tasks";

/// Link column on Channels pointing at Users records.
pub const CHANNEL_MEMBERS_LINK_FIELD: &str = "Users";

/// Field specs per table name, in creation order.
///
/// The first spec of each table becomes its primary column when the table is
/// created, so it must be a text kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaSet {
    tables: BTreeMap<String, Vec<FieldSpec>>,
}

impl SchemaSet {
    /// Load a schema file shaped like `{"Users": [{"name": ..., "type": ...}], ...}`.
    ///
    /// Tables absent from the file keep their built-in specs.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let overrides: BTreeMap<String, Vec<FieldSpec>> = serde_json::from_str(raw)?;
        let mut schema = Self::default();
        for (table, specs) in overrides {
            if specs.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "schema for table {table} must declare at least one field"
                )));
            }
            schema.tables.insert(table, specs);
        }
        schema.validate()?;
        Ok(schema)
    }

    /// Specs for a table, empty when the table is unknown.
    #[must_use]
    pub fn fields(&self, table: &str) -> &[FieldSpec] {
        self.tables.get(table).map_or(&[], Vec::as_slice)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    fn validate(&self) -> Result<()> {
        for required in [USERS_TABLE, CHANNELS_TABLE, TASKS_TABLE] {
            let Some(primary) = self.fields(required).first() else {
                return Err(Error::InvalidInput(format!(
                    "schema is missing table {required}"
                )));
            };
            if !matches!(
                primary.field_type,
                FieldType::SingleLineText | FieldType::MultilineText | FieldType::Email
            ) {
                return Err(Error::InvalidInput(format!(
                    "primary field {} of table {required} must be a text field",
                    primary.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for SchemaSet {
    fn default() -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(USERS_TABLE.to_string(), users_fields());
        tables.insert(CHANNELS_TABLE.to_string(), channels_fields());
        tables.insert(TASKS_TABLE.to_string(), tasks_fields());
        Self { tables }
    }
}

/// Spec for the Channels → Users link column, created once both tables exist.
#[must_use]
pub fn members_link_spec(users_table_id: &str) -> FieldSpec {
    FieldSpec::new(CHANNEL_MEMBERS_LINK_FIELD, FieldType::MultipleRecordLinks)
        .with_options(json!({ "linkedTableId": users_table_id }))
}

fn text(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldType::SingleLineText)
}

fn checkbox(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldType::Checkbox)
        .with_options(json!({ "icon": "check", "color": "greenBright" }))
}

fn integer(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldType::Number).with_options(json!({ "precision": 0 }))
}

fn timestamp(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldType::DateTime).with_options(json!({
        "timeZone": "utc",
        "dateFormat": { "name": "iso" },
        "timeFormat": { "name": "24hour" }
    }))
}

fn users_fields() -> Vec<FieldSpec> {
    let roles = [
        "Bot",
        "Owner",
        "Primary Owner",
        "Restricted",
        "Ultra Restricted",
        "Admin",
    ]
    .iter()
    .map(|name| json!({ "name": name }))
    .collect::<Vec<_>>();

    vec![
        text("Id"),
        text("Display Name"),
        text("Real Name"),
        FieldSpec::new("Email", FieldType::Email),
        timestamp("Updated"),
        integer("Num Channels"),
        checkbox("Is Active"),
        FieldSpec::new("Role", FieldType::MultipleSelects)
            .with_options(json!({ "choices": roles })),
    ]
}

fn channels_fields() -> Vec<FieldSpec> {
    vec![
        text("Id"),
        text("Name"),
        FieldSpec::new("Topic", FieldType::MultilineText),
        FieldSpec::new("Purpose", FieldType::MultilineText),
        checkbox("Is Private"),
        checkbox("Is Archived"),
        text("Creator Id"),
        timestamp("Created"),
        integer("Num Members"),
    ]
}

fn tasks_fields() -> Vec<FieldSpec> {
    vec![
        text("Id"),
        checkbox("Is Manual"),
        integer("Num of additions"),
        integer("Num of updates"),
        integer("Num of deletions"),
        timestamp("Update Time"),
    ]
}
