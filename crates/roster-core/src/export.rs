//! Plain-text exports of mirrored tables.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::models::{field_map_to_json, FieldValue};
use crate::sync::TableSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// One exported row: remote id plus raw field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub id: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Render a table as pretty-printed JSON, in snapshot order.
pub fn render_json_export(snapshot: &TableSnapshot) -> serde_json::Result<String> {
    let items = snapshot
        .records()
        .iter()
        .map(|record| ExportRecord {
            id: record.remote_id.to_string(),
            fields: field_map_to_json(&record.fields),
        })
        .collect::<Vec<_>>();
    serde_json::to_string_pretty(&items)
}

/// Render a table as a Markdown table with one column per schema field.
///
/// Columns follow schema order; fields missing from a record render empty.
#[must_use]
pub fn render_markdown_export(snapshot: &TableSnapshot) -> String {
    let columns = snapshot
        .schema()
        .fields
        .iter()
        .map(|field| field.name.as_str())
        .collect::<Vec<_>>();

    let mut output = String::new();
    let _ = writeln!(output, "# {}", snapshot.name());
    let _ = writeln!(output);

    if columns.is_empty() {
        let _ = writeln!(output, "_No columns._");
        return output;
    }

    let header = columns
        .iter()
        .map(|name| escape_cell(name))
        .collect::<Vec<_>>()
        .join(" | ");
    let _ = writeln!(output, "| {header} |");
    let _ = writeln!(output, "|{}", " --- |".repeat(columns.len()));

    for record in snapshot.records() {
        let row = columns
            .iter()
            .map(|name| record.fields.get(*name).map_or_else(String::new, render_cell))
            .collect::<Vec<_>>()
            .join(" | ");
        let _ = writeln!(output, "| {row} |");
    }

    output
}

/// Render a table in the selected format.
pub fn render_table_export(
    snapshot: &TableSnapshot,
    format: ExportFormat,
) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(snapshot),
        ExportFormat::Markdown => Ok(render_markdown_export(snapshot)),
    }
}

/// File name for a table export, e.g. `users.json`.
#[must_use]
pub fn suggested_export_file_name(table: &str, format: ExportFormat) -> String {
    let stem = table
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>();
    let stem = if stem.is_empty() { "table" } else { stem.as_str() };
    format!("{stem}.{}", format.extension())
}

fn render_cell(value: &FieldValue) -> String {
    let text = match value {
        FieldValue::Null => String::new(),
        FieldValue::Bool(flag) => flag.to_string(),
        FieldValue::Number(number) => number.to_string(),
        FieldValue::Text(text) => text.clone(),
        FieldValue::List(items) => items.join(", "),
        FieldValue::Json(raw) => raw.to_string(),
    };
    escape_cell(&text)
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{
        FieldMap, FieldSchema, FieldType, RemoteId, StoredRecord, TableId, TableSchema,
    };

    fn snapshot() -> TableSnapshot {
        let field = |name: &str, field_type| FieldSchema {
            id: format!("fld{name}"),
            name: name.to_string(),
            field_type,
        };
        let mut fields = FieldMap::new();
        fields.insert("Id".into(), FieldValue::text("c1"));
        fields.insert("Name".into(), FieldValue::text("general | main"));
        fields.insert("Users".into(), FieldValue::list(["rec1", "rec2"]));

        TableSnapshot::with_records(
            TableSchema {
                id: TableId("tblChannels".into()),
                name: "Channels".into(),
                fields: vec![
                    field("Id", FieldType::SingleLineText),
                    field("Name", FieldType::SingleLineText),
                    field("Is Private", FieldType::Checkbox),
                    field("Users", FieldType::MultipleRecordLinks),
                ],
            },
            vec![StoredRecord::new(RemoteId::new("recC1"), fields)],
        )
    }

    #[test]
    fn markdown_export_renders_schema_columns() {
        let rendered = render_markdown_export(&snapshot());
        assert_eq!(
            rendered,
            "# Channels\n\n\
             | Id | Name | Is Private | Users |\n\
             | --- | --- | --- | --- |\n\
             | c1 | general \\| main |  | rec1, rec2 |\n"
        );
    }

    #[test]
    fn json_export_keeps_remote_ids() {
        let rendered = render_json_export(&snapshot()).unwrap();
        let parsed: Vec<ExportRecord> = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "recC1");
        assert_eq!(parsed[0].fields["Users"], serde_json::json!(["rec1", "rec2"]));
    }

    #[test]
    fn suggested_export_file_name_uses_table_and_extension() {
        assert_eq!(
            suggested_export_file_name("Users", ExportFormat::Json),
            "users.json"
        );
        assert_eq!(
            suggested_export_file_name("Sync Tasks", ExportFormat::Markdown),
            "sync-tasks.md"
        );
    }
}
