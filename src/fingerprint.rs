//! Order-independent result fingerprinting.
//!
//! A fingerprint accumulates the result rows of one run and produces a
//! content digest that is invariant under the order rows arrived on the
//! stream and under the order of pairs within a row. Repeated runs — or
//! different engines answering the same query — produce an identical digest
//! exactly when they returned the same multiset of answers.

use crate::engine::ResultRow;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::fmt::Write as _;

// ============================================================================
// Hash Configuration
// ============================================================================

/// Hash algorithm used for result fingerprints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl std::str::FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(format!("unsupported hash algorithm: {other}")),
        }
    }
}

/// Text encoding of the final digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestEncoding {
    #[default]
    Hex,
    Base64,
}

impl std::str::FromStr for DigestEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hex" => Ok(Self::Hex),
            "base64" => Ok(Self::Base64),
            other => Err(format!("unsupported digest encoding: {other}")),
        }
    }
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Accumulates result rows and digests them into an order-independent hash.
///
/// `digest` consumes the fingerprint: producing the digest closes the
/// measurement, and each run owns exactly one. A second digest of the same
/// instance is a compile error, not a runtime failure.
#[derive(Debug)]
pub struct Fingerprint {
    algorithm: HashAlgorithm,
    encoding: DigestEncoding,
    rows: Vec<String>,
}

impl Fingerprint {
    /// Create a fingerprint with the configured algorithm and encoding.
    pub fn new(algorithm: HashAlgorithm, encoding: DigestEncoding) -> Self {
        Self {
            algorithm,
            encoding,
            rows: Vec::new(),
        }
    }

    /// Fold one result row into the fingerprint.
    ///
    /// Pairs are sorted bytewise by name and joined as `name:value` lines,
    /// so the intra-row pair order never affects the digest.
    pub fn add(&mut self, row: &ResultRow) {
        let mut pairs: Vec<(&str, &str)> = row.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        let mut canonical = String::new();
        for (i, (name, value)) in pairs.iter().enumerate() {
            if i > 0 {
                canonical.push('\n');
            }
            canonical.push_str(name);
            canonical.push(':');
            canonical.push_str(value);
        }
        self.rows.push(canonical);
    }

    /// Number of rows folded in so far.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows have been folded in.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Consume the fingerprint and produce the digest.
    ///
    /// The canonical row strings are sorted bytewise and streamed into the
    /// hasher in that order, which makes the digest independent of the order
    /// rows arrived in. Zero rows digest to the hash of empty input.
    pub fn digest(mut self) -> String {
        self.rows.sort();
        let bytes = match self.algorithm {
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                for row in &self.rows {
                    hasher.update(row.as_bytes());
                }
                hasher.finalize().to_vec()
            }
            HashAlgorithm::Sha512 => {
                let mut hasher = Sha512::new();
                for row in &self.rows {
                    hasher.update(row.as_bytes());
                }
                hasher.finalize().to_vec()
            }
        };
        encode_digest(&bytes, self.encoding)
    }
}

fn encode_digest(bytes: &[u8], encoding: DigestEncoding) -> String {
    match encoding {
        DigestEncoding::Hex => {
            let mut out = String::with_capacity(bytes.len() * 2);
            for byte in bytes {
                let _ = write!(out, "{byte:02x}");
            }
            out
        }
        DigestEncoding::Base64 => BASE64_STANDARD.encode(bytes),
    }
}
