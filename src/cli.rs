//! CLI argument parsing using Clap.

use crate::config::Manifest;
use crate::error::{Error, Result};
use crate::fingerprint::{DigestEncoding, HashAlgorithm};
use clap::Parser;
use std::path::PathBuf;

/// qbench - benchmark-execution harness for query-answering engines
#[derive(Parser, Debug)]
#[command(name = "qbench")]
#[command(version, about, long_about = None)]
#[command(after_help = "Examples:
  qbench --manifest bench.json                 Run the matrix described by bench.json
  qbench --manifest bench.json --repeat 5      Override the repeat count
  qbench --manifest bench.json --results out   Write result files into out/
  qbench --manifest bench.json --verbose       Per-run debug logging
")]
pub struct Cli {
    /// Benchmark manifest (JSON)
    #[arg(long, env = "QBENCH_MANIFEST")]
    pub manifest: PathBuf,

    /// Override the manifest's repeat count
    #[arg(long)]
    pub repeat: Option<u32>,

    /// Override the manifest's results directory
    #[arg(long, env = "QBENCH_RESULTS")]
    pub results: Option<PathBuf>,

    /// Hash algorithm for result fingerprints
    #[arg(long, value_parser = ["sha256", "sha512"])]
    pub hash_algorithm: Option<String>,

    /// Text encoding of fingerprint digests
    #[arg(long, value_parser = ["hex", "base64"])]
    pub digest_encoding: Option<String>,

    /// Don't record requested URLs per run
    #[arg(long)]
    pub no_record_urls: bool,

    /// Keep engine caches warm between runs (skip invalidation)
    #[arg(long)]
    pub keep_caches: bool,

    /// Force verbose logging
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    /// Fold the CLI overrides into a loaded manifest.
    pub fn apply_overrides(&self, manifest: &mut Manifest) -> Result<()> {
        if let Some(repeat) = self.repeat {
            manifest.repeat = repeat;
        }
        if let Some(results) = &self.results {
            manifest.results.clone_from(results);
        }
        if let Some(algorithm) = &self.hash_algorithm {
            manifest.hash_algorithm = algorithm.parse::<HashAlgorithm>().map_err(Error::config)?;
        }
        if let Some(encoding) = &self.digest_encoding {
            manifest.digest_encoding = encoding.parse::<DigestEncoding>().map_err(Error::config)?;
        }
        if self.no_record_urls {
            manifest.record_urls = false;
        }
        if self.keep_caches {
            manifest.fresh_measurement = false;
        }
        Ok(())
    }
}
