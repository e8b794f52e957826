//! In-process remote store with failure injection.
//!
//! Behaves like the Airtable API for everything the mirror uses: generated
//! ids, paginated listing, batch limits. Tests script failures per operation
//! or per domain id and inspect the call log afterwards.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{RecordPage, RemoteStore, MAX_BATCH_SIZE};
use crate::models::{
    FieldMap, FieldSchema, FieldSpec, RemoteId, StoredRecord, TableId, TableSchema,
    DOMAIN_ID_FIELD,
};
use crate::{Error, Result};

const DEFAULT_PAGE_SIZE: usize = 100;

/// Kind of remote call, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    ListTables,
    CreateTable,
    CreateField,
    ListRecords,
    CreateRecords,
    UpdateRecords,
    DeleteRecord,
}

/// One logged call and the number of records it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub op: RemoteOp,
    pub records: usize,
}

#[derive(Debug)]
struct StoredTable {
    schema: TableSchema,
    records: Vec<StoredRecord>,
}

#[derive(Debug, Default)]
struct State {
    tables: Vec<StoredTable>,
    next_id: u64,
    calls: Vec<RemoteCall>,
    failing_ops: HashSet<RemoteOp>,
    failing_domain_ids: HashSet<String>,
}

impl State {
    fn generate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:06}", self.next_id)
    }

    fn table_mut(&mut self, table: &TableId) -> Result<&mut StoredTable> {
        self.tables
            .iter_mut()
            .find(|stored| &stored.schema.id == table)
            .ok_or_else(|| Error::transport(format!("table {table} not found")))
    }

    fn check(&mut self, op: RemoteOp, records: usize) -> Result<()> {
        self.calls.push(RemoteCall { op, records });
        if self.failing_ops.contains(&op) {
            return Err(Error::transport(format!("injected {op:?} failure")));
        }
        Ok(())
    }

    fn check_domain_ids<'a>(&self, mut fields: impl Iterator<Item = &'a FieldMap>) -> Result<()> {
        let hit = fields.find_map(|fields| {
            fields
                .get(DOMAIN_ID_FIELD)
                .and_then(|value| value.as_text())
                .filter(|id| self.failing_domain_ids.contains(*id))
        });
        match hit {
            Some(id) => Err(Error::transport(format!("injected failure for {id}"))),
            None => Ok(()),
        }
    }
}

/// Thread-safe in-memory [`RemoteStore`].
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: page_size.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every call of `op` fail until cleared.
    pub fn fail_on(&self, op: RemoteOp) {
        self.lock().failing_ops.insert(op);
    }

    /// Make any write carrying `domain_id` fail, and any delete of a record
    /// holding it.
    pub fn fail_domain_id(&self, domain_id: impl Into<String>) {
        self.lock().failing_domain_ids.insert(domain_id.into());
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_ops.clear();
        state.failing_domain_ids.clear();
    }

    /// Calls made so far, in arrival order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Sizes of the calls made for `op`, sorted descending.
    pub fn batch_sizes(&self, op: RemoteOp) -> Vec<usize> {
        let mut sizes = self
            .lock()
            .calls
            .iter()
            .filter(|call| call.op == op)
            .map(|call| call.records)
            .collect::<Vec<_>>();
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes
    }

    /// Number of write calls (create, update, delete, schema changes) made so far.
    pub fn write_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| {
                !matches!(call.op, RemoteOp::ListTables | RemoteOp::ListRecords)
            })
            .count()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    /// Current contents of a table by name.
    pub fn records(&self, table_name: &str) -> Vec<StoredRecord> {
        self.lock()
            .tables
            .iter()
            .find(|table| table.schema.name == table_name)
            .map(|table| table.records.clone())
            .unwrap_or_default()
    }

    /// Insert a record directly, bypassing the call log and failure rules.
    pub fn seed_record(&self, table_name: &str, fields: FieldMap) -> Result<RemoteId> {
        let mut state = self.lock();
        let id = RemoteId(state.generate_id("rec"));
        let table = state
            .tables
            .iter_mut()
            .find(|table| table.schema.name == table_name)
            .ok_or_else(|| Error::InvalidInput(format!("table {table_name} not found")))?;
        table.records.push(StoredRecord::new(id.clone(), fields));
        Ok(id)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_tables(&self) -> Result<Vec<TableSchema>> {
        let mut state = self.lock();
        state.check(RemoteOp::ListTables, 0)?;
        Ok(state
            .tables
            .iter()
            .map(|table| table.schema.clone())
            .collect())
    }

    async fn create_table(&self, name: &str, fields: &[FieldSpec]) -> Result<TableSchema> {
        let mut state = self.lock();
        state.check(RemoteOp::CreateTable, 0)?;
        if state.tables.iter().any(|table| table.schema.name == name) {
            return Err(Error::transport(format!("table {name} already exists")));
        }
        if fields.is_empty() {
            return Err(Error::transport("a table needs at least one field"));
        }

        let table_id = TableId(state.generate_id("tbl"));
        let mut columns = Vec::with_capacity(fields.len());
        for spec in fields {
            columns.push(FieldSchema {
                id: state.generate_id("fld"),
                name: spec.name.clone(),
                field_type: spec.field_type.clone(),
            });
        }
        let schema = TableSchema {
            id: table_id,
            name: name.to_string(),
            fields: columns,
        };
        state.tables.push(StoredTable {
            schema: schema.clone(),
            records: Vec::new(),
        });
        Ok(schema)
    }

    async fn create_field(&self, table: &TableId, field: &FieldSpec) -> Result<FieldSchema> {
        let mut state = self.lock();
        state.check(RemoteOp::CreateField, 0)?;
        let id = state.generate_id("fld");
        let stored = state.table_mut(table)?;
        if stored.schema.field(&field.name).is_some() {
            return Err(Error::transport(format!(
                "field {} already exists",
                field.name
            )));
        }
        let column = FieldSchema {
            id,
            name: field.name.clone(),
            field_type: field.field_type.clone(),
        };
        stored.schema.push_field(column.clone());
        Ok(column)
    }

    async fn list_records(&self, table: &TableId, offset: Option<&str>) -> Result<RecordPage> {
        let page_size = self.page_size;
        let mut state = self.lock();
        state.check(RemoteOp::ListRecords, 0)?;
        let start = match offset {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| Error::transport(format!("invalid offset {raw}")))?,
            None => 0,
        };
        let stored = state.table_mut(table)?;
        let end = (start + page_size).min(stored.records.len());
        let records = stored.records.get(start..end).unwrap_or_default().to_vec();
        let offset = (end < stored.records.len()).then(|| end.to_string());
        Ok(RecordPage { records, offset })
    }

    async fn create_records(
        &self,
        table: &TableId,
        records: &[FieldMap],
    ) -> Result<Vec<StoredRecord>> {
        let mut state = self.lock();
        state.check(RemoteOp::CreateRecords, records.len())?;
        check_batch(records.len())?;
        state.check_domain_ids(records.iter())?;

        let created = records
            .iter()
            .map(|fields| {
                let fields = fields
                    .iter()
                    .filter(|(_, value)| !value.is_falsy_default())
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect::<FieldMap>();
                StoredRecord::new(RemoteId(state.generate_id("rec")), fields)
            })
            .collect::<Vec<_>>();
        state
            .table_mut(table)?
            .records
            .extend(created.iter().cloned());
        Ok(created)
    }

    async fn update_records(
        &self,
        table: &TableId,
        records: &[(RemoteId, FieldMap)],
    ) -> Result<Vec<StoredRecord>> {
        let mut state = self.lock();
        state.check(RemoteOp::UpdateRecords, records.len())?;
        check_batch(records.len())?;
        state.check_domain_ids(records.iter().map(|(_, fields)| fields))?;

        let stored = state.table_mut(table)?;
        if let Some((missing, _)) = records
            .iter()
            .find(|(id, _)| !stored.records.iter().any(|record| &record.remote_id == id))
        {
            return Err(Error::transport(format!("record {missing} not found")));
        }

        let mut updated = Vec::with_capacity(records.len());
        for (id, changes) in records {
            if let Some(record) = stored.records.iter_mut().find(|record| &record.remote_id == id) {
                let mut fields = record.fields.clone();
                for (name, value) in changes {
                    if value.is_falsy_default() {
                        fields.remove(name);
                    } else {
                        fields.insert(name.clone(), value.clone());
                    }
                }
                *record = StoredRecord::new(id.clone(), fields);
                updated.push(record.clone());
            }
        }
        Ok(updated)
    }

    async fn delete_record(&self, table: &TableId, record: &RemoteId) -> Result<()> {
        let mut state = self.lock();
        state.check(RemoteOp::DeleteRecord, 1)?;
        let failing = state.failing_domain_ids.clone();
        let stored = state.table_mut(table)?;
        let index = stored
            .records
            .iter()
            .position(|candidate| &candidate.remote_id == record)
            .ok_or_else(|| Error::transport(format!("record {record} not found")))?;
        if let Some(domain_id) = stored.records[index]
            .domain_id
            .as_ref()
            .filter(|id| failing.contains(*id))
        {
            return Err(Error::transport(format!(
                "injected failure for {domain_id}"
            )));
        }
        stored.records.remove(index);
        Ok(())
    }
}

fn check_batch(len: usize) -> Result<()> {
    if len > MAX_BATCH_SIZE {
        return Err(Error::transport(format!(
            "batch of {len} exceeds {MAX_BATCH_SIZE} records"
        )));
    }
    Ok(())
}
