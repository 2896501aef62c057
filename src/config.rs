//! Benchmark manifest loading and validation.
//!
//! The manifest is the single explicit configuration struct for a harness
//! invocation, assembled once at process start (file plus CLI overrides)
//! and passed by value into the matrix driver. The core never reads
//! ambient process state.

use crate::error::{Error, Result};
use crate::fingerprint::{DigestEncoding, HashAlgorithm};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Declarative description of one benchmark matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Engine configuration files; one engine instance is built per entry.
    pub configs: Vec<PathBuf>,

    /// Query files, or directories of query files.
    pub queries: Vec<PathBuf>,

    /// Directory result files are written into.
    pub results: PathBuf,

    /// Runs per (configuration, query) cell.
    #[serde(alias = "replication")]
    pub repeat: u32,

    /// Optional JSON file holding the opaque query context object.
    pub context: Option<PathBuf>,

    /// Hash algorithm for result fingerprints.
    pub hash_algorithm: HashAlgorithm,

    /// Text encoding of fingerprint digests.
    pub digest_encoding: DigestEncoding,

    /// Record the ordered list of requested URLs per run.
    pub record_urls: bool,

    /// Invalidate the engine's cache before every run so measurements are
    /// not contaminated by caches warmed by a previous run.
    pub fresh_measurement: bool,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            configs: Vec::new(),
            queries: Vec::new(),
            results: PathBuf::from("results"),
            repeat: 1,
            context: None,
            hash_algorithm: HashAlgorithm::default(),
            digest_encoding: DigestEncoding::default(),
            record_urls: true,
            fresh_measurement: true,
        }
    }
}

impl Manifest {
    /// Load a manifest from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::config(format!("cannot read manifest {}: {err}", path.display()))
        })?;
        let manifest: Self = serde_json::from_str(&content).map_err(|err| {
            Error::config(format!("invalid manifest {}: {err}", path.display()))
        })?;
        Ok(manifest)
    }

    /// Check the manifest describes a runnable matrix.
    pub fn validate(&self) -> Result<()> {
        if self.configs.is_empty() {
            return Err(Error::config("manifest lists no engine configurations"));
        }
        if self.queries.is_empty() {
            return Err(Error::config("manifest lists no queries"));
        }
        if self.repeat == 0 {
            return Err(Error::config("repeat count must be at least 1"));
        }
        Ok(())
    }
}
