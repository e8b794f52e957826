use std::path::{Path, PathBuf};

use roster_core::export::{
    render_table_export, suggested_export_file_name, ExportFormat as CoreFormat,
};
use roster_core::Mirror;

use crate::cli::ExportFormat;
use crate::commands::common::{open_mirror, GlobalPaths};
use crate::error::CliError;

pub async fn run_export(
    paths: &GlobalPaths,
    format: ExportFormat,
    output_dir: &Path,
) -> Result<(), CliError> {
    let mirror = open_mirror(paths).await?;
    mirror.refresh_all().await?;
    for path in write_exports(&mirror, format, output_dir).await? {
        println!("{}", path.display());
    }
    Ok(())
}

/// Write one file per table into `output_dir`, returning the written paths.
pub async fn write_exports(
    mirror: &Mirror,
    format: ExportFormat,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, CliError> {
    let format = match format {
        ExportFormat::Json => CoreFormat::Json,
        ExportFormat::Markdown => CoreFormat::Markdown,
    };
    std::fs::create_dir_all(output_dir)?;

    let mut written = Vec::new();
    for snapshot in mirror.snapshots().await {
        let rendered = render_table_export(&snapshot, format)?;
        let path = output_dir.join(suggested_export_file_name(snapshot.name(), format));
        std::fs::write(&path, rendered)?;
        written.push(path);
    }
    Ok(written)
}
