//! roster CLI - mirror a workspace into an Airtable base
//!
//! Bootstraps the base schema, pushes workspace dumps on demand or on a
//! daily schedule, and exports the mirrored tables.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::bootstrap::run_bootstrap;
use crate::commands::common::GlobalPaths;
use crate::commands::completions::run_completions;
use crate::commands::export::run_export;
use crate::commands::plan::run_plan;
use crate::commands::schedule::run_schedule;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "roster=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = GlobalPaths {
        config: cli.config,
        schema: cli.schema,
    };

    match cli.command {
        Commands::Bootstrap => run_bootstrap(&paths).await?,
        Commands::Sync {
            input,
            scheduled,
            json,
        } => run_sync(&paths, &input, scheduled, json).await?,
        Commands::Plan { input, json } => run_plan(&paths, &input, json).await?,
        Commands::Export { format, output } => run_export(&paths, format, &output).await?,
        Commands::Schedule { at, input } => run_schedule(&paths, &at, &input).await?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
