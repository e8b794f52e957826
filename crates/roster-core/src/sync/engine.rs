//! Run orchestration: bootstrap, refresh and full reconciliation runs.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::models::schema::{
    members_link_spec, CHANNELS_TABLE, CHANNEL_MEMBERS_LINK_FIELD, TASKS_TABLE, USERS_TABLE,
};
use crate::models::{DesiredRecord, FieldSpec, SchemaSet, SyncReport, TableRunStats, TableSchema};
use crate::remote::RemoteStore;
use crate::sync::dispatch::Dispatcher;
use crate::sync::plan::{check_unique, plan, simulate_apply, ChangeSet};
use crate::sync::resolve::{check_references, known_domain_ids, resolve_links, CHANNEL_MEMBERS};
use crate::sync::snapshot::{SnapshotDelta, TableSnapshot};
use crate::util::sanitize;
use crate::{Error, Result};

/// Successful run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub report: SyncReport,
    pub users: TableRunStats,
    pub channels: TableRunStats,
}

impl RunOutcome {
    /// Nothing was added, updated or deleted. The report is still written.
    #[must_use]
    pub const fn is_no_change(&self) -> bool {
        self.users.total() == 0 && self.channels.total() == 0
    }
}

/// Change sets a run would apply, computed without writing.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub users: ChangeSet,
    pub channels: ChangeSet,
}

/// Keeps the Users, Channels and Tasks tables of a base in line with the
/// workspace.
pub struct Mirror {
    store: Arc<dyn RemoteStore>,
    dispatcher: Dispatcher,
    users: Mutex<TableSnapshot>,
    channels: Mutex<TableSnapshot>,
    tasks: Mutex<TableSnapshot>,
    last_run: StdMutex<BTreeMap<String, TableRunStats>>,
}

impl fmt::Debug for Mirror {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Mirror")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl Mirror {
    /// Make sure the three tables and all their columns exist, creating
    /// whatever is missing, and return a mirror with empty snapshots.
    ///
    /// Safe to run against an already bootstrapped base.
    pub async fn bootstrap(
        store: Arc<dyn RemoteStore>,
        config: EngineConfig,
        schemas: &SchemaSet,
    ) -> Result<Self> {
        config.validate()?;
        let existing = store
            .list_tables()
            .await
            .map_err(|error| Error::schema(format!("failed to list tables: {}", sanitize(&error))))?;

        let (users, mut channels, tasks) = tokio::try_join!(
            ensure_table(store.as_ref(), &existing, USERS_TABLE, schemas.fields(USERS_TABLE)),
            ensure_table(
                store.as_ref(),
                &existing,
                CHANNELS_TABLE,
                schemas.fields(CHANNELS_TABLE)
            ),
            ensure_table(store.as_ref(), &existing, TASKS_TABLE, schemas.fields(TASKS_TABLE)),
        )?;

        if channels.field(CHANNEL_MEMBERS_LINK_FIELD).is_none() {
            let spec = members_link_spec(users.id.as_str());
            let field = store
                .create_field(&channels.id, &spec)
                .await
                .map_err(|error| schema_error(CHANNELS_TABLE, &spec, &error))?;
            channels.push_field(field);
        }

        info!(
            users = %users.id,
            channels = %channels.id,
            tasks = %tasks.id,
            "Schema ready"
        );

        Ok(Self {
            dispatcher: Dispatcher::new(store.clone(), config),
            store,
            users: Mutex::new(TableSnapshot::new(users)),
            channels: Mutex::new(TableSnapshot::new(channels)),
            tasks: Mutex::new(TableSnapshot::new(tasks)),
            last_run: StdMutex::new(BTreeMap::new()),
        })
    }

    /// Reload all three snapshots from the remote store.
    ///
    /// This is the recovery step after any failed run.
    pub async fn refresh_all(&self) -> Result<()> {
        let store = self.store.as_ref();
        let mut users = self.users.lock().await;
        let mut channels = self.channels.lock().await;
        let mut tasks = self.tasks.lock().await;
        let (users, channels, tasks) = tokio::try_join!(
            users.refresh(store),
            channels.refresh(store),
            tasks.refresh(store),
        )?;
        info!(users, channels, tasks, "Refreshed snapshots");
        Ok(())
    }

    /// Push the given users and channels and append a report to Tasks.
    ///
    /// Users are written first so channel membership can link to them. A
    /// channel naming a user missing from `users` aborts the run before
    /// anything is written, even when that user is still stored. A failure while pushing Users skips
    /// Channels entirely.
    pub async fn reconcile_and_push(
        &self,
        users: Vec<DesiredRecord>,
        channels: Vec<DesiredRecord>,
        is_manual: bool,
    ) -> Result<RunOutcome> {
        self.set_last_run(TableRunStats::default(), TableRunStats::default());
        let store = self.store.as_ref();
        let mut users_snapshot = self.users.lock().await;
        let mut channels_snapshot = self.channels.lock().await;

        tokio::try_join!(
            users_snapshot.refresh(store),
            channels_snapshot.refresh(store)
        )?;

        check_unique(CHANNELS_TABLE, &channels)?;
        check_references(
            &channels,
            &CHANNEL_MEMBERS,
            &known_domain_ids(&users),
        )?;

        let users_plan = plan(&users, &users_snapshot)?;
        let users_outcome = self.dispatcher.apply(users_plan, &mut users_snapshot).await;
        self.set_last_run(users_outcome.stats, TableRunStats::default());
        let users_stats = users_outcome.into_result()?;

        let channels = resolve_links(channels, &CHANNEL_MEMBERS, &users_snapshot)?;
        let channels_plan = plan(&channels, &channels_snapshot)?;
        let channels_outcome = self
            .dispatcher
            .apply(channels_plan, &mut channels_snapshot)
            .await;
        self.set_last_run(users_stats, channels_outcome.stats);
        let channels_stats = channels_outcome.into_result()?;

        drop(channels_snapshot);
        drop(users_snapshot);

        let report = SyncReport::new(is_manual, users_stats.combine(channels_stats));
        self.append_report(&report).await?;

        let outcome = RunOutcome {
            report,
            users: users_stats,
            channels: channels_stats,
        };
        if outcome.is_no_change() {
            info!(is_manual, "Sync finished with no changes");
        } else {
            info!(
                is_manual,
                additions = outcome.report.additions,
                updates = outcome.report.updates,
                deletions = outcome.report.deletions,
                "Sync finished"
            );
        }
        Ok(outcome)
    }

    /// Compute what [`Mirror::reconcile_and_push`] would do, without writing.
    ///
    /// Users that would be added are linked through placeholder ids so the
    /// channel plan reflects the membership they will get.
    pub async fn preview(
        &self,
        users: &[DesiredRecord],
        channels: Vec<DesiredRecord>,
    ) -> Result<RunPlan> {
        let store = self.store.as_ref();
        let mut users_snapshot = self.users.lock().await;
        let mut channels_snapshot = self.channels.lock().await;
        tokio::try_join!(
            users_snapshot.refresh(store),
            channels_snapshot.refresh(store)
        )?;

        check_unique(CHANNELS_TABLE, &channels)?;
        check_references(
            &channels,
            &CHANNEL_MEMBERS,
            &known_domain_ids(users),
        )?;

        let users_plan = plan(users, &users_snapshot)?;
        let projected_users = simulate_apply(&users_plan, &users_snapshot);
        let channels = resolve_links(channels, &CHANNEL_MEMBERS, &projected_users)?;
        let channels_plan = plan(&channels, &channels_snapshot)?;

        Ok(RunPlan {
            users: users_plan,
            channels: channels_plan,
        })
    }

    /// Per-table counters of the most recent run, failed runs included.
    pub fn last_run_stats(&self) -> BTreeMap<String, TableRunStats> {
        self.last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Copy of a table snapshot by table name.
    pub async fn snapshot(&self, table: &str) -> Option<TableSnapshot> {
        let snapshot = match table {
            USERS_TABLE => &self.users,
            CHANNELS_TABLE => &self.channels,
            TASKS_TABLE => &self.tasks,
            _ => return None,
        };
        Some(snapshot.lock().await.clone())
    }

    /// Copies of all three snapshots, Users first.
    pub async fn snapshots(&self) -> Vec<TableSnapshot> {
        vec![
            self.users.lock().await.clone(),
            self.channels.lock().await.clone(),
            self.tasks.lock().await.clone(),
        ]
    }

    async fn append_report(&self, report: &SyncReport) -> Result<()> {
        let row = report.to_desired();
        let mut tasks = self.tasks.lock().await;
        let created = self
            .store
            .create_records(tasks.table_id(), std::slice::from_ref(&row.fields))
            .await
            .map_err(|error| {
                warn!(report = %report.id, error = %sanitize(&error), "Failed to write sync report");
                error
            })?;
        tasks.merge(SnapshotDelta {
            added: created,
            ..SnapshotDelta::default()
        });
        Ok(())
    }

    fn set_last_run(&self, users: TableRunStats, channels: TableRunStats) {
        let mut last_run = self.last_run.lock().unwrap_or_else(PoisonError::into_inner);
        last_run.insert(USERS_TABLE.to_string(), users);
        last_run.insert(CHANNELS_TABLE.to_string(), channels);
    }
}

async fn ensure_table(
    store: &dyn RemoteStore,
    existing: &[TableSchema],
    name: &str,
    specs: &[FieldSpec],
) -> Result<TableSchema> {
    let Some(found) = existing.iter().find(|table| table.name == name) else {
        let created = store.create_table(name, specs).await.map_err(|error| {
            Error::schema(format!("failed to create table {name}: {}", sanitize(&error)))
        })?;
        info!(table = name, id = %created.id, "Created table");
        return Ok(created);
    };

    let mut table = found.clone();
    let missing = table
        .missing_fields(specs)
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();
    for spec in missing {
        let field = store
            .create_field(&table.id, &spec)
            .await
            .map_err(|error| schema_error(name, &spec, &error))?;
        info!(table = name, field = %field.name, "Created field");
        table.push_field(field);
    }
    Ok(table)
}

fn schema_error(table: &str, spec: &FieldSpec, error: &Error) -> Error {
    Error::schema(format!(
        "failed to create field {} on table {table}: {}",
        spec.name,
        sanitize(error)
    ))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{FieldMap, FieldType, FieldValue, WorkspaceDump, DOMAIN_ID_FIELD};
    use crate::remote::memory::RemoteOp;
    use crate::remote::MemoryStore;

    fn dump() -> WorkspaceDump {
        serde_json::from_value(serde_json::json!({
            "users": [
                {
                    "id": "u1",
                    "display_name": "alice",
                    "real_name": "Alice Liddell",
                    "email": "alice@example.com",
                    "updated": "2024-05-01T10:00:00Z",
                    "roles": ["Admin"],
                    "channel_ids": ["c1"]
                },
                {
                    "id": "u2",
                    "display_name": "bob",
                    "real_name": "Bob Builder",
                    "updated": "2024-05-02T10:00:00Z",
                    "channel_ids": ["c1"]
                }
            ],
            "channels": [
                {
                    "id": "c1",
                    "name": "general",
                    "topic": "Company wide",
                    "creator_id": "u1",
                    "created": "2023-01-01T00:00:00Z",
                    "member_ids": ["u1", "u2"]
                }
            ]
        }))
        .unwrap()
    }

    async fn mirror() -> (Arc<MemoryStore>, Mirror) {
        let store = Arc::new(MemoryStore::new());
        let mirror = Mirror::bootstrap(store.clone(), EngineConfig::default(), &SchemaSet::default())
            .await
            .unwrap();
        (store, mirror)
    }

    #[tokio::test]
    async fn bootstrap_creates_tables_and_link_field() {
        let (store, mirror) = mirror().await;

        let tables = store.list_tables().await.unwrap();
        let names = tables.iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names.len(), 3);
        for name in [USERS_TABLE, CHANNELS_TABLE, TASKS_TABLE] {
            assert!(names.contains(&name));
        }

        let channels = mirror.snapshot(CHANNELS_TABLE).await.unwrap();
        assert_eq!(
            channels.schema().field_type(CHANNEL_MEMBERS_LINK_FIELD),
            FieldType::MultipleRecordLinks
        );
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent_and_adds_missing_fields() {
        let store = Arc::new(MemoryStore::new());
        store
            .create_table(
                USERS_TABLE,
                &[FieldSpec::new(DOMAIN_ID_FIELD, FieldType::SingleLineText)],
            )
            .await
            .unwrap();
        store.reset_calls();

        Mirror::bootstrap(store.clone(), EngineConfig::default(), &SchemaSet::default())
            .await
            .unwrap();
        assert_eq!(store.batch_sizes(RemoteOp::CreateTable).len(), 2);
        assert!(!store.batch_sizes(RemoteOp::CreateField).is_empty());

        store.reset_calls();
        Mirror::bootstrap(store.clone(), EngineConfig::default(), &SchemaSet::default())
            .await
            .unwrap();
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn bootstrap_failure_is_a_schema_error() {
        let store = Arc::new(MemoryStore::new());
        store.fail_on(RemoteOp::CreateTable);
        let err = Mirror::bootstrap(store, EngineConfig::default(), &SchemaSet::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[tokio::test]
    async fn full_run_links_channels_and_writes_report() {
        let (store, mirror) = mirror().await;
        let dump = dump();

        let outcome = mirror
            .reconcile_and_push(dump.desired_users(), dump.desired_channels(), true)
            .await
            .unwrap();

        assert_eq!(
            outcome.users,
            TableRunStats {
                added: 2,
                updated: 0,
                deleted: 0
            }
        );
        assert_eq!(outcome.channels.added, 1);
        assert_eq!(outcome.report.additions, 3);

        let users = store.records(USERS_TABLE);
        let channel = &store.records(CHANNELS_TABLE)[0];
        let mut linked = channel.fields[CHANNEL_MEMBERS_LINK_FIELD]
            .as_list()
            .unwrap()
            .to_vec();
        linked.sort();
        let mut expected = users
            .iter()
            .map(|user| user.remote_id.as_str().to_string())
            .collect::<Vec<_>>();
        expected.sort();
        assert_eq!(linked, expected);

        let reports = store.records(TASKS_TABLE);
        assert_eq!(reports.len(), 1);
        assert_eq!(
            reports[0].fields.get("Is Manual"),
            Some(&FieldValue::Bool(true))
        );
        assert_eq!(
            reports[0].fields.get("Num of additions"),
            Some(&FieldValue::count(3))
        );
    }

    #[tokio::test]
    async fn second_identical_run_changes_nothing() {
        let (store, mirror) = mirror().await;
        let dump = dump();
        mirror
            .reconcile_and_push(dump.desired_users(), dump.desired_channels(), true)
            .await
            .unwrap();

        let outcome = mirror
            .reconcile_and_push(dump.desired_users(), dump.desired_channels(), false)
            .await
            .unwrap();

        assert!(outcome.is_no_change());
        assert_eq!(store.batch_sizes(RemoteOp::UpdateRecords), Vec::<usize>::new());
        assert_eq!(store.records(TASKS_TABLE).len(), 2);
    }

    #[tokio::test]
    async fn removed_user_is_deleted_and_unlinked() {
        let (store, mirror) = mirror().await;
        let mut dump = dump();
        mirror
            .reconcile_and_push(dump.desired_users(), dump.desired_channels(), true)
            .await
            .unwrap();

        dump.users.retain(|user| user.id != "u2");
        dump.channels[0].member_ids.retain(|id| id != "u2");
        let outcome = mirror
            .reconcile_and_push(dump.desired_users(), dump.desired_channels(), true)
            .await
            .unwrap();

        assert_eq!(outcome.users.deleted, 1);
        assert_eq!(outcome.channels.updated, 1);
        assert_eq!(store.records(USERS_TABLE).len(), 1);
        let channel = &store.records(CHANNELS_TABLE)[0];
        assert_eq!(
            channel.fields[CHANNEL_MEMBERS_LINK_FIELD].as_list().map(<[String]>::len),
            Some(1)
        );
    }

    #[tokio::test]
    async fn unknown_member_aborts_before_any_write() {
        let (store, mirror) = mirror().await;
        let mut dump = dump();
        dump.channels[0].member_ids.push("u9".to_string());
        store.reset_calls();

        let err = mirror
            .reconcile_and_push(dump.desired_users(), dump.desired_channels(), true)
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::Resolution { ref domain_id, .. } if domain_id == "u9")
        );
        assert!(store.records(USERS_TABLE).is_empty());
        assert!(store.records(TASKS_TABLE).is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn member_dropped_from_users_aborts_with_users_untouched() {
        let (store, mirror) = mirror().await;
        let mut dump = dump();
        mirror
            .reconcile_and_push(dump.desired_users(), dump.desired_channels(), true)
            .await
            .unwrap();
        store.reset_calls();

        dump.users.retain(|user| user.id != "u2");
        let err = mirror
            .reconcile_and_push(dump.desired_users(), dump.desired_channels(), true)
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::Resolution { ref domain_id, .. } if domain_id == "u2")
        );
        assert_eq!(store.records(USERS_TABLE).len(), 2);
        assert_eq!(store.records(TASKS_TABLE).len(), 1);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn failed_user_batch_skips_channels_and_report() {
        let (store, mirror) = mirror().await;
        let dump = dump();
        store.fail_domain_id("u2");

        let err = mirror
            .reconcile_and_push(dump.desired_users(), dump.desired_channels(), true)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::PartialApply { ref table, .. } if table == USERS_TABLE));
        assert!(err.requires_refresh());
        assert!(store.records(CHANNELS_TABLE).is_empty());
        assert!(store.records(TASKS_TABLE).is_empty());
        assert_eq!(mirror.last_run_stats()[USERS_TABLE].added, 0);

        store.clear_failures();
        mirror.refresh_all().await.unwrap();
        let outcome = mirror
            .reconcile_and_push(dump.desired_users(), dump.desired_channels(), true)
            .await
            .unwrap();
        assert_eq!(outcome.users.added, 2);
    }

    #[tokio::test]
    async fn duplicate_desired_user_is_rejected() {
        let (store, mirror) = mirror().await;
        let mut users = dump().desired_users();
        users.push(users[0].clone());
        store.reset_calls();

        let err = mirror
            .reconcile_and_push(users, Vec::new(), true)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateDomainId { .. }));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn stray_remote_rows_are_removed() {
        let (store, mirror) = mirror().await;
        let mut orphan = FieldMap::new();
        orphan.insert("Display Name".into(), FieldValue::text("no id"));
        store.seed_record(USERS_TABLE, orphan).unwrap();

        let outcome = mirror
            .reconcile_and_push(Vec::new(), Vec::new(), false)
            .await
            .unwrap();

        assert_eq!(outcome.users.deleted, 1);
        assert!(store.records(USERS_TABLE).is_empty());
        assert_eq!(mirror.last_run_stats()[USERS_TABLE].deleted, 1);
    }

    #[tokio::test]
    async fn preview_counts_without_writing() {
        let (store, mirror) = mirror().await;
        let dump = dump();
        store.reset_calls();

        let preview = mirror
            .preview(&dump.desired_users(), dump.desired_channels())
            .await
            .unwrap();

        assert_eq!(preview.users.stats().added, 2);
        assert_eq!(preview.channels.stats().added, 1);
        assert_eq!(store.write_count(), 0);
    }
}
