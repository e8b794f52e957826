//! Data models for roster

mod field;
mod record;
mod report;
pub mod schema;
mod value;
mod workspace;

pub use field::{FieldSchema, FieldSpec, FieldType, TableId, TableSchema};
pub use record::{DesiredRecord, RemoteId, StoredRecord, DOMAIN_ID_FIELD};
pub use report::{SyncReport, TableRunStats};
pub use schema::SchemaSet;
pub use value::{field_map_from_json, field_map_to_json, FieldMap, FieldValue};
pub use workspace::{
    iso_instant, WorkspaceChannel, WorkspaceDump, WorkspaceUser, MEMBERS_ID_FIELD,
};
