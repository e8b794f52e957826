//! Where desired workspace state comes from.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::models::WorkspaceDump;
use crate::{Error, Result};

/// Produces the authoritative users and channels for one run.
#[async_trait]
pub trait WorkspaceSource: Send + Sync {
    async fn fetch(&self) -> Result<WorkspaceDump>;
}

/// Reads a workspace dump from a JSON file on every fetch.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WorkspaceSource for JsonFileSource {
    async fn fetch(&self) -> Result<WorkspaceDump> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let dump: WorkspaceDump = serde_json::from_str(&raw).map_err(|error| {
            Error::InvalidInput(format!(
                "invalid workspace dump {}: {error}",
                self.path.display()
            ))
        })?;
        debug!(
            path = %self.path.display(),
            users = dump.users.len(),
            channels = dump.channels.len(),
            "Loaded workspace dump"
        );
        Ok(dump)
    }
}
