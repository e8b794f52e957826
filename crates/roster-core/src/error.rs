//! Error types for roster-core

use thiserror::Error;

/// Result type alias using roster-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in roster-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// A remote store call returned no usable payload (network, auth, rate limit)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A cross-table reference could not be mapped to a remote identifier
    #[error("Could not resolve '{domain_id}' in table {table}")]
    Resolution { table: String, domain_id: String },

    /// Bootstrap could not create a required table or field
    #[error("Schema error: {0}")]
    Schema(String),

    /// The desired record list repeats a domain identifier
    #[error("Duplicate domain id '{domain_id}' in desired records for table {table}")]
    DuplicateDomainId { table: String, domain_id: String },

    /// Some batches of a reconciliation run failed
    #[error("{failed} batch(es) failed while pushing table {table}")]
    PartialApply { table: String, failed: usize },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Whether the snapshot may now disagree with the remote store.
    ///
    /// Callers should run a full refresh after such an error instead of
    /// retrying the same change set.
    pub const fn requires_refresh(&self) -> bool {
        matches!(self, Self::PartialApply { .. } | Self::Transport(_))
    }
}
