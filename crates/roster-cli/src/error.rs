use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] roster_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid schedule time '{0}': expected HH:MM or HH:MM:SS")]
    InvalidScheduleTime(String),
    #[error("Could not compute the next scheduled run after {0}")]
    Schedule(String),
}
