//! Concurrent, size-bounded application of a change set.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::models::{FieldMap, RemoteId, StoredRecord, TableId, TableRunStats};
use crate::remote::{RemoteStore, MAX_BATCH_SIZE};
use crate::sync::plan::ChangeSet;
use crate::sync::snapshot::{SnapshotDelta, TableSnapshot};
use crate::util::sanitize;
use crate::{Error, Result};

/// Runs futures with at most `size` of them in flight, then waits for all.
#[derive(Debug)]
pub struct WorkerPool {
    permits: Semaphore,
    size: usize,
}

impl WorkerPool {
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Semaphore::new(size),
            size,
        }
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Run every task and return their outputs in submission order.
    pub async fn run_all<F, T>(&self, tasks: impl IntoIterator<Item = F>) -> Vec<T>
    where
        F: Future<Output = T>,
    {
        join_all(tasks.into_iter().map(|task| async move {
            // never closed
            let _permit = self.permits.acquire().await.ok();
            task.await
        }))
        .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Add,
    Update,
    Delete,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// A batch the remote store rejected. Nothing in it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub kind: BatchKind,
    pub domain_ids: Vec<String>,
    pub error: String,
}

/// Result of applying one change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub table: String,
    /// Records actually written, not planned.
    pub stats: TableRunStats,
    pub failures: Vec<BatchFailure>,
}

impl ApplyOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Stats on success, [`Error::PartialApply`] otherwise.
    pub fn into_result(self) -> Result<TableRunStats> {
        if self.failures.is_empty() {
            Ok(self.stats)
        } else {
            Err(Error::PartialApply {
                table: self.table,
                failed: self.failures.len(),
            })
        }
    }
}

/// Applies change sets to the remote store.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn RemoteStore>,
    config: EngineConfig,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Dispatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

type BatchResult<T> = std::result::Result<T, BatchFailure>;

impl Dispatcher {
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    fn batch_size(&self) -> usize {
        self.config.batch_size.clamp(1, MAX_BATCH_SIZE)
    }

    /// Apply `change_set` and fold the confirmed writes into `snapshot`.
    ///
    /// Deletes, adds and updates run concurrently; a failed batch does not
    /// stop the others. The snapshot is only touched once every batch has
    /// finished.
    pub async fn apply(&self, change_set: ChangeSet, snapshot: &mut TableSnapshot) -> ApplyOutcome {
        let table_id = snapshot.table_id().clone();
        let table = snapshot.name().to_string();

        if change_set.is_empty() {
            return ApplyOutcome {
                table,
                stats: TableRunStats::default(),
                failures: Vec::new(),
            };
        }

        let (deleted, added, updated) = tokio::join!(
            self.delete_all(&table_id, &change_set.to_delete),
            self.add_all(&table_id, &change_set),
            self.update_all(&table_id, &change_set),
        );

        let mut failures = Vec::new();
        let mut delta = SnapshotDelta::default();
        for result in deleted {
            match result {
                Ok(id) => delta.deleted.push(id),
                Err(failure) => failures.push(failure),
            }
        }
        for result in added {
            match result {
                Ok(records) => delta.added.extend(records),
                Err(failure) => failures.push(failure),
            }
        }
        for result in updated {
            match result {
                Ok(records) => delta.updated.extend(records),
                Err(failure) => failures.push(failure),
            }
        }

        for failure in &failures {
            warn!(
                table = %table,
                kind = %failure.kind,
                records = failure.domain_ids.len(),
                error = %failure.error,
                "Remote batch failed"
            );
        }

        let stats = TableRunStats {
            added: delta.added.len(),
            updated: delta.updated.len(),
            deleted: delta.deleted.len(),
        };
        snapshot.merge(delta);

        info!(
            table = %table,
            added = stats.added,
            updated = stats.updated,
            deleted = stats.deleted,
            failed_batches = failures.len(),
            "Applied change set"
        );

        ApplyOutcome {
            table,
            stats,
            failures,
        }
    }

    async fn delete_all(
        &self,
        table_id: &TableId,
        records: &[StoredRecord],
    ) -> Vec<BatchResult<RemoteId>> {
        let pool = WorkerPool::new(records.len().min(self.config.delete_concurrency));
        pool.run_all(records.iter().map(|record| async move {
            self.store
                .delete_record(table_id, &record.remote_id)
                .await
                .map(|()| record.remote_id.clone())
                .map_err(|error| BatchFailure {
                    kind: BatchKind::Delete,
                    domain_ids: record.domain_id.iter().cloned().collect(),
                    error: sanitize(&error),
                })
        }))
        .await
    }

    async fn add_all(
        &self,
        table_id: &TableId,
        change_set: &ChangeSet,
    ) -> Vec<BatchResult<Vec<StoredRecord>>> {
        let pool = WorkerPool::new(self.config.batch_concurrency);
        pool.run_all(
            change_set
                .to_add
                .chunks(self.batch_size())
                .map(|chunk| async move {
                    let fields = chunk
                        .iter()
                        .map(|record| record.fields.clone())
                        .collect::<Vec<FieldMap>>();
                    let created = self.store.create_records(table_id, &fields).await;
                    info!(
                        table = %table_id,
                        records = chunk.len(),
                        ok = created.is_ok(),
                        "Add batch finished"
                    );
                    created.map_err(|error| BatchFailure {
                        kind: BatchKind::Add,
                        domain_ids: chunk.iter().map(|record| record.domain_id.clone()).collect(),
                        error: sanitize(&error),
                    })
                }),
        )
        .await
    }

    async fn update_all(
        &self,
        table_id: &TableId,
        change_set: &ChangeSet,
    ) -> Vec<BatchResult<Vec<StoredRecord>>> {
        let pool = WorkerPool::new(self.config.batch_concurrency);
        pool.run_all(
            change_set
                .to_update
                .chunks(self.batch_size())
                .map(|chunk| async move {
                    let records = chunk
                        .iter()
                        .map(|update| (update.record.remote_id.clone(), update.fields.clone()))
                        .collect::<Vec<_>>();
                    let updated = self.store.update_records(table_id, &records).await;
                    info!(
                        table = %table_id,
                        records = chunk.len(),
                        ok = updated.is_ok(),
                        "Update batch finished"
                    );
                    updated.map_err(|error| BatchFailure {
                        kind: BatchKind::Update,
                        domain_ids: chunk
                            .iter()
                            .filter_map(|update| update.record.domain_id.clone())
                            .collect(),
                        error: sanitize(&error),
                    })
                }),
        )
        .await
    }
}
