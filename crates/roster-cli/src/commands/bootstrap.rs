use crate::commands::common::{open_mirror, GlobalPaths};
use crate::error::CliError;

pub async fn run_bootstrap(paths: &GlobalPaths) -> Result<(), CliError> {
    let mirror = open_mirror(paths).await?;
    for snapshot in mirror.snapshots().await {
        println!(
            "{} ({}): {} fields",
            snapshot.name(),
            snapshot.table_id(),
            snapshot.schema().fields.len()
        );
    }
    Ok(())
}
