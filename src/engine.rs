//! Query engine abstraction layer.
//!
//! This module defines the engine trait and common types for measuring
//! different query-answering engines. The engine itself is opaque to the
//! harness beyond its submit/stream contract.

use crate::error::Result;
use crate::fetch::Fetcher;
use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

// ============================================================================
// Engine Trait
// ============================================================================

/// A lazy stream of result rows, terminated by an end signal (stream
/// exhaustion) or a single error item — never both.
pub type RowStream = Pin<Box<dyn Stream<Item = Result<ResultRow>> + Send>>;

/// A query-answering engine under measurement.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Identifier of the configuration this engine was built from.
    fn id(&self) -> &str;

    /// Submit a query string and obtain the result stream.
    ///
    /// A submission failure (the engine rejects the query before producing
    /// any stream) is reported as `Err`; failures mid-stream surface as an
    /// error item on the returned stream.
    async fn submit_query(&self, query: &str, context: &QueryContext) -> Result<RowStream>;

    /// Drop internal caches warmed by previous runs.
    ///
    /// Engines without caches can keep the default no-op.
    async fn invalidate_cache(&self) -> Result<()> {
        Ok(())
    }
}

/// Builds engine instances from declarative configuration files.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Construct an engine from the given configuration path.
    async fn create(&self, config_path: &Path) -> Result<Arc<dyn Engine>>;
}

// ============================================================================
// Result Rows
// ============================================================================

/// One answer to a query: an ordered set of (name, value) pairs.
///
/// Names are unique within a row. The order of pairs and the order of rows
/// on a stream carry no semantic meaning; the fingerprint normalizes both
/// away before hashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    entries: Vec<(String, String)>,
}

impl ResultRow {
    /// Create an empty row.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a (name, value) pair. A pair with an already-present name
    /// replaces the previous value, keeping names unique.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value.into();
        } else {
            self.entries.push((name, value.into()));
        }
    }

    /// Look up a value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate the pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of pairs in the row.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the row has no pairs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResultRow {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for ResultRow {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut row = Self::new();
        for (name, value) in iter {
            row.push(name, value);
        }
        row
    }
}

// ============================================================================
// Query Context
// ============================================================================

/// Context for a query submission: an opaque key/value bag merged with the
/// instrumented fetch capability for the run.
#[derive(Clone, Default)]
pub struct QueryContext {
    bag: serde_json::Map<String, Value>,
    fetch: Option<Arc<dyn Fetcher>>,
}

impl QueryContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context from a JSON object.
    pub fn from_values(bag: serde_json::Map<String, Value>) -> Self {
        Self { bag, fetch: None }
    }

    /// Return a copy of this context carrying the given fetch capability.
    #[must_use]
    pub fn with_fetch(&self, fetch: Arc<dyn Fetcher>) -> Self {
        Self {
            bag: self.bag.clone(),
            fetch: Some(fetch),
        }
    }

    /// Look up a context value by key.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.bag.get(key)
    }

    /// The context's key/value bag.
    pub fn values(&self) -> &serde_json::Map<String, Value> {
        &self.bag
    }

    /// The fetch capability engines should issue network calls through.
    pub fn fetch(&self) -> Option<&Arc<dyn Fetcher>> {
        self.fetch.as_ref()
    }
}

impl std::fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryContext")
            .field("bag", &self.bag)
            .field("fetch", &self.fetch.is_some())
            .finish()
    }
}
