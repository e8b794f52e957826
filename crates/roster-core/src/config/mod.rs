//! Runtime configuration for the mirror.
//!
//! Values come from environment variables, optionally layered over a JSON
//! config file. Environment always wins over the file.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::remote::MAX_BATCH_SIZE;
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const DEFAULT_API_URL: &str = "https://api.airtable.com";
const DEFAULT_BATCH_SIZE: usize = MAX_BATCH_SIZE;
const DEFAULT_BATCH_CONCURRENCY: usize = 10;
const DEFAULT_DELETE_CONCURRENCY: usize = 10;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const MAX_BATCH_CONCURRENCY: usize = 10;
const MAX_DELETE_CONCURRENCY: usize = 50;

/// Connection settings for the Airtable base.
#[derive(Clone, PartialEq, Eq)]
pub struct AirtableConfig {
    pub api_url: String,
    pub base_id: String,
    pub token: String,
}

impl fmt::Debug for AirtableConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AirtableConfig")
            .field("api_url", &self.api_url)
            .field("base_id", &self.base_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Batch sizing and worker pool limits for the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Records per create/update call.
    pub batch_size: usize,
    /// Create/update batches in flight at once.
    pub batch_concurrency: usize,
    /// Single-record deletes in flight at once.
    pub delete_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            delete_concurrency: DEFAULT_DELETE_CONCURRENCY,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        check_range("batch_size", self.batch_size, MAX_BATCH_SIZE)?;
        check_range(
            "batch_concurrency",
            self.batch_concurrency,
            MAX_BATCH_CONCURRENCY,
        )?;
        check_range(
            "delete_concurrency",
            self.delete_concurrency,
            MAX_DELETE_CONCURRENCY,
        )
    }
}

/// Everything a [`Mirror`](crate::sync::Mirror) run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    pub airtable: AirtableConfig,
    pub engine: EngineConfig,
    pub http_timeout: Duration,
}

/// On-disk config file. Every key is optional; missing keys fall back to
/// the environment and then to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub base_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub batch_concurrency: Option<usize>,
    #[serde(default)]
    pub delete_concurrency: Option<usize>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}

impl ConfigFile {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|error| {
            Error::Config(format!("invalid config file {}: {error}", path.display()))
        })
    }
}

impl MirrorConfig {
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    /// Load the config file at `path` (if any) and overlay the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path
            .map(ConfigFile::load_from_path)
            .transpose()?
            .unwrap_or_default();
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_sources(|name| values.get(name).cloned(), &file)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Self::from_sources(lookup, &ConfigFile::default())
    }

    fn from_sources(lookup: impl Fn(&str) -> Option<String>, file: &ConfigFile) -> Result<Self> {
        let api_url = optional_trimmed(&lookup, "AIRTABLE_API_URL")
            .or_else(|| normalize_text_option(file.api_url.clone()))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !is_http_url(&api_url) {
            return Err(Error::Config(
                "AIRTABLE_API_URL must start with http:// or https://".to_string(),
            ));
        }

        let base_id = optional_trimmed(&lookup, "AIRTABLE_BASE_ID")
            .or_else(|| normalize_text_option(file.base_id.clone()))
            .ok_or_else(|| missing("AIRTABLE_BASE_ID"))?;
        let token = optional_trimmed(&lookup, "AIRTABLE_TOKEN")
            .or_else(|| normalize_text_option(file.token.clone()))
            .ok_or_else(|| missing("AIRTABLE_TOKEN"))?;

        let engine = EngineConfig {
            batch_size: parse_or(&lookup, "ROSTER_BATCH_SIZE", file.batch_size, DEFAULT_BATCH_SIZE)?,
            batch_concurrency: parse_or(
                &lookup,
                "ROSTER_BATCH_CONCURRENCY",
                file.batch_concurrency,
                DEFAULT_BATCH_CONCURRENCY,
            )?,
            delete_concurrency: parse_or(
                &lookup,
                "ROSTER_DELETE_CONCURRENCY",
                file.delete_concurrency,
                DEFAULT_DELETE_CONCURRENCY,
            )?,
        };
        engine.validate()?;

        let http_timeout_secs = parse_or(
            &lookup,
            "ROSTER_HTTP_TIMEOUT_SECS",
            file.http_timeout_secs,
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?;
        if http_timeout_secs == 0 {
            return Err(Error::Config(
                "ROSTER_HTTP_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            airtable: AirtableConfig {
                api_url: api_url.trim_end_matches('/').to_string(),
                base_id,
                token,
            },
            engine,
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }
}

fn missing(name: &str) -> Error {
    Error::Config(format!("missing required setting {name}"))
}

fn check_range(name: &str, value: usize, max: usize) -> Result<()> {
    if (1..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::Config(format!("{name} must be in [1, {max}]")))
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    file_value: Option<T>,
    default: T,
) -> Result<T> {
    match optional_trimmed(lookup, name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{name} must be a positive integer"))),
        None => Ok(file_value.unwrap_or(default)),
    }
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}
