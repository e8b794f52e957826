use std::path::Path;

use roster_core::{JsonFileSource, WorkspaceSource};

use crate::commands::common::{format_plan_lines, open_mirror, GlobalPaths, PlanSummary};
use crate::error::CliError;

pub async fn run_plan(paths: &GlobalPaths, input: &Path, as_json: bool) -> Result<(), CliError> {
    let mirror = open_mirror(paths).await?;
    let dump = JsonFileSource::new(input).fetch().await?;
    let plan = mirror
        .preview(&dump.desired_users(), dump.desired_channels())
        .await?;
    let summary = PlanSummary::from(&plan);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for line in format_plan_lines(&summary) {
            println!("{line}");
        }
    }
    Ok(())
}
