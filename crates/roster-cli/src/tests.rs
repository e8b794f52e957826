use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use clap::Parser;
use pretty_assertions::assert_eq;
use roster_core::models::{SchemaSet, TableRunStats, WorkspaceDump};
use roster_core::{EngineConfig, MemoryStore, Mirror, WorkspaceSource};

use crate::cli::{Cli, Commands, CompletionShell, ExportFormat};
use crate::commands::common::{format_plan_lines, format_stats, load_schema, PlanSummary};
use crate::commands::completions::render_completions;
use crate::commands::export::write_exports;
use crate::commands::schedule::{next_run_after, parse_time_of_day};
use crate::commands::sync::sync_once;
use crate::error::CliError;

struct StaticSource(WorkspaceDump);

#[async_trait::async_trait]
impl WorkspaceSource for StaticSource {
    async fn fetch(&self) -> roster_core::Result<WorkspaceDump> {
        Ok(self.0.clone())
    }
}

fn dump() -> WorkspaceDump {
    serde_json::from_str(
        r#"{
            "users": [
                {"id": "u1", "display_name": "alice", "real_name": "Alice",
                 "updated": "2024-05-01T10:00:00Z", "channel_ids": ["c1"]}
            ],
            "channels": [
                {"id": "c1", "name": "general", "creator_id": "u1",
                 "created": "2023-01-01T00:00:00Z", "member_ids": ["u1"]}
            ]
        }"#,
    )
    .unwrap()
}

async fn memory_mirror() -> (Arc<MemoryStore>, Mirror) {
    let store = Arc::new(MemoryStore::new());
    let mirror = Mirror::bootstrap(store.clone(), EngineConfig::default(), &SchemaSet::default())
        .await
        .unwrap();
    (store, mirror)
}

#[test]
fn parse_time_of_day_accepts_minutes_and_seconds() {
    assert_eq!(
        parse_time_of_day("07:30").unwrap(),
        NaiveTime::from_hms_opt(7, 30, 0).unwrap()
    );
    assert_eq!(
        parse_time_of_day(" 23:59:58 ").unwrap(),
        NaiveTime::from_hms_opt(23, 59, 58).unwrap()
    );
}

#[test]
fn parse_time_of_day_rejects_garbage() {
    for raw in ["", "7", "25:00", "07:30pm"] {
        assert!(matches!(
            parse_time_of_day(raw),
            Err(CliError::InvalidScheduleTime(_))
        ));
    }
}

#[test]
fn next_run_is_today_when_time_is_ahead() {
    let now = NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(6, 0, 0)
        .unwrap();
    let at = NaiveTime::from_hms_opt(7, 30, 0).unwrap();
    assert_eq!(
        next_run_after(now, at),
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap()
    );
}

#[test]
fn next_run_rolls_over_to_tomorrow() {
    let at = NaiveTime::from_hms_opt(7, 30, 0).unwrap();
    for (hour, minute) in [(7, 30), (22, 0)] {
        let now = NaiveDate::from_ymd_opt(2024, 12, 31)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap();
        assert_eq!(
            next_run_after(now, at),
            NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(7, 30, 0)
                .unwrap()
        );
    }
}

#[test]
fn cli_parses_sync_with_global_flags() {
    let cli = Cli::try_parse_from([
        "roster",
        "sync",
        "--input",
        "dump.json",
        "--scheduled",
        "--config",
        "roster.json",
    ])
    .unwrap();

    assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("roster.json")));
    match cli.command {
        Commands::Sync {
            input,
            scheduled,
            json,
        } => {
            assert_eq!(input, std::path::PathBuf::from("dump.json"));
            assert!(scheduled);
            assert!(!json);
        }
        _ => panic!("expected sync command"),
    }
}

#[test]
fn cli_requires_input_for_sync() {
    assert!(Cli::try_parse_from(["roster", "sync"]).is_err());
}

#[test]
fn completions_mention_binary_name() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("roster"));
}

#[test]
fn format_stats_lists_all_counters() {
    let stats = TableRunStats {
        added: 3,
        updated: 1,
        deleted: 2,
    };
    assert_eq!(format_stats(&stats), "+3 added, ~1 updated, -2 deleted");
    let lines = format_plan_lines(&PlanSummary {
        users: stats,
        channels: TableRunStats::default(),
    });
    assert_eq!(lines[1], "Channels: +0 added, ~0 updated, -0 deleted");
}

#[test]
fn load_schema_defaults_without_path() {
    assert_eq!(load_schema(None).unwrap(), SchemaSet::default());
}

#[tokio::test]
async fn sync_once_pushes_dump_as_scheduled_run() {
    let (store, mirror) = memory_mirror().await;

    let outcome = sync_once(&mirror, &StaticSource(dump()), false)
        .await
        .unwrap();

    assert!(!outcome.report.is_manual);
    assert_eq!(outcome.users.added, 1);
    assert_eq!(store.records("Channels").len(), 1);
}

#[tokio::test]
async fn sync_once_surfaces_resolution_failures() {
    let (store, mirror) = memory_mirror().await;
    let mut dump = dump();
    dump.channels[0].member_ids.push("u9".to_string());

    let err = sync_once(&mirror, &StaticSource(dump), true)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CliError::Core(roster_core::Error::Resolution { .. })
    ));
    assert!(store.records("Users").is_empty());
}

#[tokio::test]
async fn write_exports_creates_one_file_per_table() {
    let (_store, mirror) = memory_mirror().await;
    sync_once(&mirror, &StaticSource(dump()), true)
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();

    let written = write_exports(&mirror, ExportFormat::Markdown, dir.path())
        .await
        .unwrap();

    let names = written
        .iter()
        .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["users.md", "channels.md", "tasks.md"]);
    let users = std::fs::read_to_string(dir.path().join("users.md")).unwrap();
    assert!(users.contains("| u1 | alice |"));
}
