//! Storage collaborator: query and context loading, result-file writes.
//!
//! Query bodies and the optional context object are read synchronously at
//! startup while the manifest is being resolved. Result files are written
//! asynchronously by the matrix driver, one pretty-printed JSON document
//! per (configuration, query) cell.

use crate::error::{Error, Result};
use crate::executor::RunMetrics;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

// ============================================================================
// Query Loading
// ============================================================================

/// One query to benchmark: identifier plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub id: String,
    pub text: String,
}

/// Load queries from the given paths.
///
/// Each path is either a single query file or a directory whose files are
/// each one query. Identifiers are file stems; directory entries are read
/// in name order so the query sequence is deterministic.
pub fn load_queries(paths: &[PathBuf]) -> Result<Vec<QuerySpec>> {
    let mut queries = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
                .collect::<std::io::Result<Vec<_>>>()?
                .into_iter()
                .map(|entry| entry.path())
                .filter(|entry| entry.is_file())
                .collect();
            entries.sort();
            for entry in entries {
                queries.push(load_query_file(&entry)?);
            }
        } else {
            queries.push(load_query_file(path)?);
        }
    }
    let mut seen = std::collections::HashSet::new();
    for query in &queries {
        if !seen.insert(query.id.as_str()) {
            return Err(Error::config(format!(
                "duplicate query identifier: {}",
                query.id
            )));
        }
    }
    info!(count = queries.len(), "loaded queries");
    Ok(queries)
}

fn load_query_file(path: &Path) -> Result<QuerySpec> {
    let text = std::fs::read_to_string(path)?;
    Ok(QuerySpec {
        id: file_id(path),
        text,
    })
}

/// Load the optional query context: a JSON object of opaque key/value
/// pairs passed through to the engine.
pub fn load_context(path: &Path) -> Result<serde_json::Map<String, Value>> {
    let text = std::fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&text)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::config(format!(
            "context file {} must contain a JSON object, found {}",
            path.display(),
            json_type_name(&other)
        ))),
    }
}

/// Derive an identifier from a file path: the file stem, with characters
/// outside `[A-Za-z0-9._-]` replaced so identifiers compose into file
/// names.
pub fn file_id(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map_or_else(|| path.to_string_lossy(), |stem| stem.to_string_lossy());
    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Result Store
// ============================================================================

/// Writes per-cell result files into the results directory.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    /// Create a store rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Ensure the results directory exists.
    pub async fn prepare(&self) -> Result<()> {
        asupersync::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Deterministic path of the result file for one cell.
    pub fn cell_path(&self, config_id: &str, query_id: &str) -> PathBuf {
        self.dir.join(format!("{config_id}--{query_id}.json"))
    }

    /// Serialize one cell's run list to its result file.
    ///
    /// Called exactly once per cell, after its repeat loop ends by
    /// exhaustion or abort; the file is never updated in place.
    pub async fn write_cell(
        &self,
        config_id: &str,
        query_id: &str,
        runs: &[RunMetrics],
    ) -> Result<PathBuf> {
        let path = self.cell_path(config_id, query_id);
        let json = serde_json::to_string_pretty(runs)
            .map_err(|err| Error::serialization(path.display().to_string(), err.to_string()))?;
        asupersync::fs::write(&path, json.as_bytes())
            .await
            .map_err(|err| Error::serialization(path.display().to_string(), err.to_string()))?;
        info!(path = %path.display(), runs = runs.len(), "wrote result file");
        Ok(path)
    }
}
