//! Reconciliation and batched writes against the remote store.
//!
//! A run flows through these modules in order: [`snapshot`] reloads the
//! remote table, [`resolve`] turns cross-table references into remote ids,
//! [`plan`] diffs desired against stored records using [`compare`], and
//! [`dispatch`] writes the change set in bounded concurrent batches.
//! [`engine`] strings them together per table.

pub mod compare;
pub mod dispatch;
pub mod engine;
pub mod plan;
pub mod resolve;
pub mod snapshot;

pub use compare::{equal, record_matches};
pub use dispatch::{ApplyOutcome, BatchFailure, BatchKind, Dispatcher, WorkerPool};
pub use engine::{Mirror, RunOutcome, RunPlan};
pub use plan::{plan, simulate_apply, ChangeSet, RecordUpdate};
pub use resolve::{check_references, known_domain_ids, resolve_links, LinkRule, CHANNEL_MEMBERS};
pub use snapshot::{SnapshotDelta, TableSnapshot};
