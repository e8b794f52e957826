//! In-memory copy of a remote table.

use serde::Serialize;
use tracing::debug;

use crate::models::{RemoteId, StoredRecord, TableId, TableSchema};
use crate::remote::RemoteStore;
use crate::Result;

/// Last known contents of one remote table, in remote listing order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSnapshot {
    schema: TableSchema,
    records: Vec<StoredRecord>,
}

/// Successful remote writes to fold into a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotDelta {
    pub deleted: Vec<RemoteId>,
    pub added: Vec<StoredRecord>,
    pub updated: Vec<StoredRecord>,
}

impl TableSnapshot {
    #[must_use]
    pub const fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_records(schema: TableSchema, records: Vec<StoredRecord>) -> Self {
        Self { schema, records }
    }

    #[must_use]
    pub const fn schema(&self) -> &TableSchema {
        &self.schema
    }

    #[must_use]
    pub const fn table_id(&self) -> &TableId {
        &self.schema.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    #[must_use]
    pub fn records(&self) -> &[StoredRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record carrying `domain_id`.
    #[must_use]
    pub fn find_by_domain_id(&self, domain_id: &str) -> Option<&StoredRecord> {
        self.records
            .iter()
            .find(|record| record.domain_id.as_deref() == Some(domain_id))
    }

    /// Replace the contents with a full listing of the remote table.
    ///
    /// Pages are collected first; if any page fails the snapshot is left
    /// untouched and the error is returned.
    pub async fn refresh(&mut self, store: &dyn RemoteStore) -> Result<usize> {
        let mut fetched = Vec::new();
        let mut offset: Option<String> = None;
        let mut pages = 0_usize;

        loop {
            let page = store
                .list_records(&self.schema.id, offset.as_deref())
                .await?;
            pages += 1;
            debug!(
                table = %self.schema.name,
                page = pages,
                records = page.records.len(),
                "Fetched record page"
            );
            fetched.extend(page.records);
            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        self.records = fetched;
        Ok(self.records.len())
    }

    /// Fold confirmed remote writes into the snapshot.
    ///
    /// Deleted ids are removed, added records appended and updated records
    /// replace the entry with the same remote id.
    pub fn merge(&mut self, delta: SnapshotDelta) {
        if !delta.deleted.is_empty() {
            self.records
                .retain(|record| !delta.deleted.contains(&record.remote_id));
        }

        for record in delta.updated {
            match self
                .records
                .iter_mut()
                .find(|existing| existing.remote_id == record.remote_id)
            {
                Some(existing) => *existing = record,
                None => self.records.push(record),
            }
        }

        self.records.extend(delta.added);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{FieldMap, FieldSpec, FieldType, FieldValue};
    use crate::remote::memory::RemoteOp;
    use crate::remote::MemoryStore;

    fn record(remote_id: &str, domain_id: &str, name: &str) -> StoredRecord {
        let mut fields = FieldMap::new();
        fields.insert("Id".into(), FieldValue::text(domain_id));
        fields.insert("Name".into(), FieldValue::text(name));
        StoredRecord::new(RemoteId::new(remote_id), fields)
    }

    fn schema() -> TableSchema {
        TableSchema {
            id: TableId("tblUsers".into()),
            name: "Users".into(),
            fields: Vec::new(),
        }
    }

    #[test]
    fn merge_applies_deletes_updates_and_adds() {
        let mut snapshot = TableSnapshot::with_records(
            schema(),
            vec![
                record("r1", "u1", "Alice"),
                record("r2", "u2", "Bob"),
                record("r3", "u3", "Carol"),
            ],
        );

        snapshot.merge(SnapshotDelta {
            deleted: vec![RemoteId::new("r2")],
            added: vec![record("r4", "u4", "Dan")],
            updated: vec![record("r3", "u3", "Caroline")],
        });

        let names = snapshot
            .records()
            .iter()
            .map(|record| record.fields["Name"].as_text().unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Alice", "Caroline", "Dan"]);
        assert_eq!(
            snapshot.find_by_domain_id("u3").map(|r| r.remote_id.as_str()),
            Some("r3")
        );
        assert!(snapshot.find_by_domain_id("u2").is_none());
    }

    #[tokio::test]
    async fn refresh_follows_pagination() {
        let store = MemoryStore::with_page_size(2);
        let table = store
            .create_table("Users", &[FieldSpec::new("Id", FieldType::SingleLineText)])
            .await
            .unwrap();
        for id in ["u1", "u2", "u3", "u4", "u5"] {
            let mut fields = FieldMap::new();
            fields.insert("Id".into(), FieldValue::text(id));
            store.seed_record("Users", fields).unwrap();
        }

        let mut snapshot = TableSnapshot::new(table);
        let count = snapshot.refresh(&store).await.unwrap();

        assert_eq!(count, 5);
        assert_eq!(store.batch_sizes(RemoteOp::ListRecords).len(), 3);
        assert!(snapshot.find_by_domain_id("u5").is_some());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_records() {
        let store = MemoryStore::new();
        let table = store
            .create_table("Users", &[FieldSpec::new("Id", FieldType::SingleLineText)])
            .await
            .unwrap();
        let mut snapshot = TableSnapshot::with_records(table, vec![record("r1", "u1", "Alice")]);

        store.fail_on(RemoteOp::ListRecords);
        assert!(snapshot.refresh(&store).await.is_err());
        assert_eq!(snapshot.len(), 1);
    }
}
