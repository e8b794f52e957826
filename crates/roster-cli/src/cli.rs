use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Mirror workspace users and channels into an Airtable base")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional JSON config file (environment variables take precedence)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Optional JSON file overriding the built-in table schemas
    #[arg(long, global = true, value_name = "PATH")]
    pub schema: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create missing tables and fields in the base
    Bootstrap,
    /// Push a workspace dump to the base and record a report
    Sync {
        /// Workspace dump (JSON with `users` and `channels`)
        #[arg(short, long, value_name = "PATH")]
        input: PathBuf,
        /// Record the run as scheduled instead of manual
        #[arg(long)]
        scheduled: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what a sync would change without writing
    Plan {
        /// Workspace dump (JSON with `users` and `channels`)
        #[arg(short, long, value_name = "PATH")]
        input: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export every mirrored table to files
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,
    },
    /// Run a sync every day at a fixed local time
    Schedule {
        /// Local time of day, `HH:MM` or `HH:MM:SS`
        #[arg(long, value_name = "TIME")]
        at: String,
        /// Workspace dump re-read before each run
        #[arg(short, long, value_name = "PATH")]
        input: PathBuf,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
