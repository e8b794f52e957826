//! Remote tabular store interface
//!
//! Every call either returns a structured payload or fails with
//! [`Error::Transport`](crate::Error::Transport). Implementations never retry.

mod airtable;
pub mod memory;

use async_trait::async_trait;

use crate::models::{
    FieldMap, FieldSchema, FieldSpec, RemoteId, StoredRecord, TableId, TableSchema,
};
use crate::Result;

pub use airtable::AirtableClient;
pub use memory::MemoryStore;

/// Maximum records per create/update call accepted by the remote API.
pub const MAX_BATCH_SIZE: usize = 10;

/// One page of a paginated record listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPage {
    pub records: Vec<StoredRecord>,
    /// Cursor for the next page; `None` on the last page.
    pub offset: Option<String>,
}

/// Operations the mirror needs from the remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List every table of the base with its columns.
    async fn list_tables(&self) -> Result<Vec<TableSchema>>;

    /// Create a table; the first spec becomes the primary column.
    async fn create_table(&self, name: &str, fields: &[FieldSpec]) -> Result<TableSchema>;

    /// Add a column to an existing table.
    async fn create_field(&self, table: &TableId, field: &FieldSpec) -> Result<FieldSchema>;

    /// Fetch one page of records starting at `offset`.
    async fn list_records(&self, table: &TableId, offset: Option<&str>) -> Result<RecordPage>;

    /// Create up to [`MAX_BATCH_SIZE`] records, returning them with their new ids.
    async fn create_records(&self, table: &TableId, records: &[FieldMap])
        -> Result<Vec<StoredRecord>>;

    /// Overwrite the given fields of up to [`MAX_BATCH_SIZE`] records.
    async fn update_records(
        &self,
        table: &TableId,
        records: &[(RemoteId, FieldMap)],
    ) -> Result<Vec<StoredRecord>>;

    /// Delete a single record.
    async fn delete_record(&self, table: &TableId, record: &RemoteId) -> Result<()>;
}
