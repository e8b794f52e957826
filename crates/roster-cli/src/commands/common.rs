use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use roster_core::models::{SchemaSet, TableRunStats};
use roster_core::sync::RunPlan;
use roster_core::{AirtableClient, Mirror, MirrorConfig, RunOutcome};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "config.json";

/// Paths shared by every command that talks to the base.
#[derive(Debug, Clone, Default)]
pub struct GlobalPaths {
    pub config: Option<PathBuf>,
    pub schema: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct PlanSummary {
    pub users: TableRunStats,
    pub channels: TableRunStats,
}

impl From<&RunPlan> for PlanSummary {
    fn from(plan: &RunPlan) -> Self {
        Self {
            users: plan.users.stats(),
            channels: plan.channels.stats(),
        }
    }
}

/// Explicit path, then `ROSTER_CONFIG`, then the per-user config file if it exists.
pub fn resolve_config_path(cli_config: Option<PathBuf>) -> Option<PathBuf> {
    cli_config
        .or_else(|| env::var_os("ROSTER_CONFIG").map(PathBuf::from))
        .or_else(|| default_config_path().filter(|path| path.exists()))
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("roster").join(CONFIG_FILE_NAME))
}

pub fn load_schema(path: Option<&Path>) -> Result<SchemaSet, CliError> {
    Ok(path
        .map(SchemaSet::load_from_path)
        .transpose()?
        .unwrap_or_default())
}

/// Load config, connect to the base and make sure its schema is in place.
pub async fn open_mirror(paths: &GlobalPaths) -> Result<Mirror, CliError> {
    let config_path = resolve_config_path(paths.config.clone());
    let config = MirrorConfig::load(config_path.as_deref())?;
    let schema = load_schema(paths.schema.as_deref())?;
    let client = AirtableClient::new(&config.airtable, config.http_timeout)?;

    info!(base = %config.airtable.base_id, "Connecting to Airtable base");
    Ok(Mirror::bootstrap(Arc::new(client), config.engine, &schema).await?)
}

/// After a failed run the snapshots may be stale; reload them so the next
/// run starts from the remote state.
pub async fn recover_after_failure(mirror: &Mirror, error: &roster_core::Error) {
    if !error.requires_refresh() {
        return;
    }
    if let Err(refresh_error) = mirror.refresh_all().await {
        warn!(error = %refresh_error, "Refresh after failed run also failed");
    }
}

pub fn format_stats(stats: &TableRunStats) -> String {
    format!(
        "+{} added, ~{} updated, -{} deleted",
        stats.added, stats.updated, stats.deleted
    )
}

pub fn format_run_lines(outcome: &RunOutcome) -> Vec<String> {
    let mode = if outcome.report.is_manual {
        "manual"
    } else {
        "scheduled"
    };
    let mut lines = vec![
        format!("Users: {}", format_stats(&outcome.users)),
        format!("Channels: {}", format_stats(&outcome.channels)),
    ];
    if outcome.is_no_change() {
        lines.push("No changes".to_string());
    }
    lines.push(format!("Report {} ({mode})", outcome.report.id));
    lines
}

pub fn format_plan_lines(summary: &PlanSummary) -> Vec<String> {
    vec![
        format!("Users: {}", format_stats(&summary.users)),
        format!("Channels: {}", format_stats(&summary.channels)),
    ]
}
