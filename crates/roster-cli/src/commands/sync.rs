use std::path::Path;

use roster_core::{JsonFileSource, Mirror, RunOutcome, WorkspaceSource};

use crate::commands::common::{format_run_lines, open_mirror, recover_after_failure, GlobalPaths};
use crate::error::CliError;

pub async fn run_sync(
    paths: &GlobalPaths,
    input: &Path,
    scheduled: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let mirror = open_mirror(paths).await?;
    let outcome = sync_once(&mirror, &JsonFileSource::new(input), !scheduled).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        for line in format_run_lines(&outcome) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Fetch the workspace and push it, refreshing snapshots if the run failed
/// midway.
pub async fn sync_once(
    mirror: &Mirror,
    source: &dyn WorkspaceSource,
    is_manual: bool,
) -> Result<RunOutcome, CliError> {
    let dump = source.fetch().await?;
    match mirror
        .reconcile_and_push(dump.desired_users(), dump.desired_channels(), is_manual)
        .await
    {
        Ok(outcome) => Ok(outcome),
        Err(error) => {
            recover_after_failure(mirror, &error).await;
            Err(error.into())
        }
    }
}
