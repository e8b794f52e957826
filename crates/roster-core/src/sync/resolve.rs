//! Cross-table reference resolution.
//!
//! Channels arrive naming their members by user domain id; the link column
//! needs the remote ids the Users table assigned to those members.

use std::collections::HashSet;

use crate::models::schema::{CHANNEL_MEMBERS_LINK_FIELD, USERS_TABLE};
use crate::models::{DesiredRecord, FieldValue, MEMBERS_ID_FIELD};
use crate::sync::snapshot::TableSnapshot;
use crate::{Error, Result};

/// Maps a list of domain ids in one field onto a link field of remote ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRule {
    /// Field holding target domain ids. Removed during resolution.
    pub source_field: &'static str,
    /// Link field written with the resolved remote ids.
    pub target_field: &'static str,
    /// Table the ids point into.
    pub target_table: &'static str,
}

/// Channel membership: `Members Id` resolved into the `Users` link.
pub const CHANNEL_MEMBERS: LinkRule = LinkRule {
    source_field: MEMBERS_ID_FIELD,
    target_field: CHANNEL_MEMBERS_LINK_FIELD,
    target_table: USERS_TABLE,
};

/// Domain ids the target table holds once the desired records are applied.
///
/// Stored rows outside `desired` are deleted by the same run, so they never
/// count as known.
#[must_use]
pub fn known_domain_ids(desired: &[DesiredRecord]) -> HashSet<&str> {
    desired
        .iter()
        .map(|record| record.domain_id.as_str())
        .collect()
}

/// Fail if any record references a domain id outside `known`.
///
/// Runs before any write so an unresolvable reference leaves every table
/// untouched.
pub fn check_references(
    records: &[DesiredRecord],
    rule: &LinkRule,
    known: &HashSet<&str>,
) -> Result<()> {
    for record in records {
        for domain_id in referenced_ids(record, rule)? {
            if !known.contains(domain_id.as_str()) {
                return Err(Error::Resolution {
                    table: rule.target_table.to_string(),
                    domain_id: domain_id.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Replace each record's source field with a link to the target records.
///
/// A single unknown id fails the whole set.
pub fn resolve_links(
    records: Vec<DesiredRecord>,
    rule: &LinkRule,
    target: &TableSnapshot,
) -> Result<Vec<DesiredRecord>> {
    records
        .into_iter()
        .map(|mut record| {
            let remote_ids = referenced_ids(&record, rule)?
                .iter()
                .map(|domain_id| {
                    target
                        .find_by_domain_id(domain_id)
                        .map(|stored| stored.remote_id.as_str().to_string())
                        .ok_or_else(|| Error::Resolution {
                            table: rule.target_table.to_string(),
                            domain_id: domain_id.clone(),
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            record.fields.remove(rule.source_field);
            record
                .fields
                .insert(rule.target_field.to_string(), FieldValue::List(remote_ids));
            Ok(record)
        })
        .collect()
}

fn referenced_ids<'a>(record: &'a DesiredRecord, rule: &LinkRule) -> Result<&'a [String]> {
    match record.fields.get(rule.source_field) {
        None => Ok(&[]),
        Some(value) => value.as_list().ok_or_else(|| {
            Error::InvalidInput(format!(
                "field {} of record {} must be a list of ids",
                rule.source_field, record.domain_id
            ))
        }),
    }
}
