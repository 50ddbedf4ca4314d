//! Configuration types for RecordIO
//!
//! Backend selection happens here, once, at process startup; components
//! receive their collaborators as injected trait objects and never look
//! backends up at call time.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration for RecordIO
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Persistence coordinator configuration
    pub persistence: PersistenceConfig,
    /// Legal compliance configuration
    pub legal: LegalConfig,
    /// External policy evaluation configuration
    pub policy: PolicyConfig,
    /// Metadata repository backend
    pub metadata_backend: MetadataBackend,
    /// Blob store backend
    pub blob_backend: BlobBackend,
}

impl Config {
    /// Load configuration from an optional file, with `RECORDIO_*`
    /// environment variables layered on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("RECORDIO").separator("__"));

        builder
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| Error::internal(format!("configuration error: {e}")))
    }
}

/// Persistence coordinator configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Maximum concurrent blob writes per batch
    pub write_concurrency: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            write_concurrency: 8,
        }
    }
}

/// Legal compliance configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LegalConfig {
    /// Country code always added to a record's relevant data countries
    pub default_data_country: String,
}

impl Default for LegalConfig {
    fn default() -> Self {
        Self {
            default_data_country: "US".to_string(),
        }
    }
}

/// External policy evaluation configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Policy id passed to the external evaluator
    pub policy_id: String,
    /// How long a partition's policy-enabled flag stays cached
    pub status_ttl_secs: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            policy_id: "storage".to_string(),
            status_ttl_secs: 60,
        }
    }
}

/// Metadata repository backend selection
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MetadataBackend {
    /// In-memory repository (tests, single-process development)
    #[default]
    Memory,
    /// redb database on local disk
    Redb { path: PathBuf },
}

/// Blob store backend selection
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BlobBackend {
    /// In-memory store (tests, single-process development)
    #[default]
    Memory,
    /// Payload files under a local directory
    Fs { root: PathBuf },
}
