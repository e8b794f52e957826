//! roster-core - Core library for roster
//!
//! Mirrors workspace users, channels and channel membership into an Airtable
//! base. Holds the table/record models, the reconciliation engine, the remote
//! store seam with its Airtable and in-memory implementations, and the export
//! helpers used by the CLI.

pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod remote;
pub mod source;
pub mod sync;
pub mod util;

pub use config::{AirtableConfig, EngineConfig, MirrorConfig};
pub use error::{Error, Result};
pub use remote::{AirtableClient, MemoryStore, RemoteStore};
pub use source::{JsonFileSource, WorkspaceSource};
pub use sync::{Mirror, RunOutcome};
