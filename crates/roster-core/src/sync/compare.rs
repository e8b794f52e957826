//! Field equality under the remote store's storage conventions.
//!
//! The remote store drops falsy values, reorders link sets and adds
//! millisecond precision to timestamps, so a plain `==` would report
//! spurious changes on every run.

use std::borrow::Cow;
use std::collections::HashSet;

use crate::models::{FieldMap, FieldType, FieldValue, StoredRecord, TableSchema};

/// Whether the stored value already satisfies the desired one.
#[must_use]
pub fn equal(field_type: &FieldType, desired: &FieldValue, stored: Option<&FieldValue>) -> bool {
    let Some(stored) = stored else {
        return desired.is_falsy_default();
    };

    if desired == stored {
        return true;
    }

    match field_type {
        FieldType::MultipleRecordLinks => links_equal(desired, stored),
        _ if field_type.is_temporal() => match (desired.as_text(), stored.as_text()) {
            (Some(desired), Some(stored)) => {
                strip_zero_millis(desired) == strip_zero_millis(stored)
            }
            _ => false,
        },
        _ => false,
    }
}

/// True when every field named in `desired` is equal to the stored value.
///
/// Stored fields the desired map does not mention are ignored.
#[must_use]
pub fn record_matches(
    schema: &TableSchema,
    stored: &StoredRecord,
    desired: &FieldMap,
) -> bool {
    desired.iter().all(|(name, value)| {
        equal(&schema.field_type(name), value, stored.fields.get(name))
    })
}

fn links_equal(desired: &FieldValue, stored: &FieldValue) -> bool {
    let (Some(desired), Some(stored)) = (desired.as_list(), stored.as_list()) else {
        return false;
    };
    if desired.len() != stored.len() {
        return false;
    }
    let desired_set = desired.iter().collect::<HashSet<_>>();
    let stored_set = stored.iter().collect::<HashSet<_>>();
    desired_set.is_subset(&stored_set) && stored_set.is_subset(&desired_set)
}

fn strip_zero_millis(value: &str) -> Cow<'_, str> {
    value
        .strip_suffix(".000Z")
        .map_or(Cow::Borrowed(value), |prefix| Cow::Owned(format!("{prefix}Z")))
}
