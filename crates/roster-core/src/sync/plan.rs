//! Change set computation.

use std::collections::{HashMap, HashSet};

use crate::models::{DesiredRecord, FieldMap, RemoteId, StoredRecord, TableRunStats};
use crate::sync::compare::record_matches;
use crate::sync::snapshot::{SnapshotDelta, TableSnapshot};
use crate::{Error, Result};

/// A stored record and the fields it should be overwritten with.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub record: StoredRecord,
    pub fields: FieldMap,
}

/// Writes needed to make a remote table match the desired records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub to_add: Vec<DesiredRecord>,
    pub to_update: Vec<RecordUpdate>,
    pub to_delete: Vec<StoredRecord>,
    /// Domain ids already in the desired state.
    pub unchanged: Vec<String>,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Planned counts, before any remote call.
    #[must_use]
    pub fn stats(&self) -> TableRunStats {
        TableRunStats {
            added: self.to_add.len(),
            updated: self.to_update.len(),
            deleted: self.to_delete.len(),
        }
    }
}

/// Reject desired lists that name the same domain id twice.
pub fn check_unique(table: &str, desired: &[DesiredRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(desired.len());
    for record in desired {
        if !seen.insert(record.domain_id.as_str()) {
            return Err(Error::DuplicateDomainId {
                table: table.to_string(),
                domain_id: record.domain_id.clone(),
            });
        }
    }
    Ok(())
}

/// Diff `desired` against the snapshot.
///
/// Stored records are indexed by domain id once, first occurrence winning.
/// Every stored record that is not matched by a desired record ends up in
/// `to_delete`: records without an `Id`, later copies of a duplicated `Id`,
/// and records the source no longer has.
pub fn plan(desired: &[DesiredRecord], snapshot: &TableSnapshot) -> Result<ChangeSet> {
    check_unique(snapshot.name(), desired)?;

    let mut index: HashMap<&str, &StoredRecord> = HashMap::with_capacity(snapshot.len());
    for record in snapshot.records() {
        if let Some(domain_id) = record.domain_id.as_deref() {
            index.entry(domain_id).or_insert(record);
        }
    }

    let mut matched: HashSet<&RemoteId> = HashSet::with_capacity(desired.len());
    let mut change_set = ChangeSet::default();

    for record in desired {
        match index.get(record.domain_id.as_str()) {
            None => change_set.to_add.push(record.clone()),
            Some(stored) => {
                matched.insert(&stored.remote_id);
                if record_matches(snapshot.schema(), stored, &record.fields) {
                    change_set.unchanged.push(record.domain_id.clone());
                } else {
                    change_set.to_update.push(RecordUpdate {
                        record: (*stored).clone(),
                        fields: record.fields.clone(),
                    });
                }
            }
        }
    }

    change_set.to_delete = snapshot
        .records()
        .iter()
        .filter(|record| !matched.contains(&record.remote_id))
        .cloned()
        .collect();

    Ok(change_set)
}

/// The snapshot a fully successful apply of `change_set` would produce.
///
/// Added records get placeholder remote ids of the form `pending:<domain id>`.
#[must_use]
pub fn simulate_apply(change_set: &ChangeSet, snapshot: &TableSnapshot) -> TableSnapshot {
    let mut simulated = snapshot.clone();
    simulated.merge(SnapshotDelta {
        deleted: change_set
            .to_delete
            .iter()
            .map(|record| record.remote_id.clone())
            .collect(),
        added: change_set
            .to_add
            .iter()
            .map(|record| {
                StoredRecord::new(
                    RemoteId::new(format!("pending:{}", record.domain_id)),
                    without_falsy(&record.fields),
                )
            })
            .collect(),
        updated: change_set
            .to_update
            .iter()
            .map(|update| {
                let mut fields = update.record.fields.clone();
                for (name, value) in &update.fields {
                    if value.is_falsy_default() {
                        fields.remove(name);
                    } else {
                        fields.insert(name.clone(), value.clone());
                    }
                }
                StoredRecord::new(update.record.remote_id.clone(), fields)
            })
            .collect(),
    });
    simulated
}

fn without_falsy(fields: &FieldMap) -> FieldMap {
    fields
        .iter()
        .filter(|(_, value)| !value.is_falsy_default())
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
