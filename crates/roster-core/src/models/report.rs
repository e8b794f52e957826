//! Sync audit report model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::DesiredRecord;
use super::value::{FieldMap, FieldValue};
use super::workspace::iso_instant;

/// Per-table counters for one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRunStats {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl TableRunStats {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.added + self.updated + self.deleted
    }

    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        Self {
            added: self.added + other.added,
            updated: self.updated + other.updated,
            deleted: self.deleted + other.deleted,
        }
    }
}

/// Audit entry appended to the Tasks table after each successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub id: Uuid,
    pub is_manual: bool,
    pub additions: usize,
    pub updates: usize,
    pub deletions: usize,
    pub timestamp: DateTime<Utc>,
}

impl SyncReport {
    #[must_use]
    pub fn new(is_manual: bool, totals: TableRunStats) -> Self {
        Self {
            id: Uuid::now_v7(),
            is_manual,
            additions: totals.added,
            updates: totals.updated,
            deletions: totals.deleted,
            timestamp: Utc::now(),
        }
    }

    /// Row written to the Tasks table.
    #[must_use]
    pub fn to_desired(&self) -> DesiredRecord {
        let mut fields = FieldMap::new();
        fields.insert("Is Manual".into(), FieldValue::Bool(self.is_manual));
        fields.insert("Num of additions".into(), FieldValue::count(self.additions));
        fields.insert("Num of updates".into(), FieldValue::count(self.updates));
        fields.insert("Num of deletions".into(), FieldValue::count(self.deletions));
        fields.insert(
            "Update Time".into(),
            FieldValue::Text(iso_instant(self.timestamp)),
        );
        DesiredRecord::new(self.id.to_string(), fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_adds_counters() {
        let users = TableRunStats {
            added: 1,
            updated: 2,
            deleted: 3,
        };
        let channels = TableRunStats {
            added: 4,
            updated: 0,
            deleted: 1,
        };
        let total = users.combine(channels);
        assert_eq!(total.added, 5);
        assert_eq!(total.total(), 11);
    }

    #[test]
    fn report_row_carries_counters_and_id() {
        let report = SyncReport::new(
            true,
            TableRunStats {
                added: 2,
                updated: 1,
                deleted: 0,
            },
        );
        let row = report.to_desired();
        assert_eq!(row.domain_id, report.id.to_string());
        assert_eq!(row.fields.get("Is Manual"), Some(&FieldValue::Bool(true)));
        assert_eq!(row.fields.get("Num of additions"), Some(&FieldValue::count(2)));
        assert_eq!(row.fields.get("Num of deletions"), Some(&FieldValue::count(0)));
    }
}
