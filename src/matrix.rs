//! Matrix driver: sequences runs over configurations × queries × repeats.
//!
//! Configurations are the outer loop, queries inner, repeats innermost, all
//! strictly sequential: the driver awaits each run's terminal outcome before
//! starting the next, so engine state and per-run instrumentation are never
//! shared between concurrent runs. Each (configuration, query) cell ends
//! Completed or Aborted and writes its result file exactly once.

use crate::config::Manifest;
use crate::engine::{Engine, EngineFactory, QueryContext};
use crate::error::Result;
use crate::executor::{QueryExecution, RunMetrics};
use crate::fetch::{Fetcher, RequestCounter};
use crate::fingerprint::Fingerprint;
use crate::storage::{self, QuerySpec, ResultStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

// ============================================================================
// Cell Reports
// ============================================================================

/// Terminal state of one (configuration, query) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellState {
    /// All repeats ran to completion.
    Completed,
    /// A run failed; remaining repeats were not executed.
    Aborted,
}

/// Outcome of one cell, including where its result file was written.
#[derive(Debug, Clone, Serialize)]
pub struct CellReport {
    pub config_id: String,
    pub query_id: String,
    pub state: CellState,
    pub runs_executed: u32,
    pub path: PathBuf,
}

/// Outcome of a whole matrix invocation.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cells: Vec<CellReport>,
    /// Configurations whose engine could not be constructed; none of their
    /// cells produced result files.
    pub failed_configs: Vec<String>,
}

impl MatrixSummary {
    /// Number of cells that aborted on a run error.
    pub fn aborted_cells(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.state == CellState::Aborted)
            .count()
    }
}

// ============================================================================
// Matrix Driver
// ============================================================================

/// Drives the full benchmark matrix described by a manifest.
pub struct MatrixDriver {
    manifest: Manifest,
    factory: Arc<dyn EngineFactory>,
    fetcher: Arc<dyn Fetcher>,
    store: ResultStore,
    queries: Vec<QuerySpec>,
    context: QueryContext,
}

impl MatrixDriver {
    /// Resolve a manifest into a runnable driver: validates it, loads the
    /// query bodies and the optional context object.
    pub fn new(
        manifest: Manifest,
        factory: Arc<dyn EngineFactory>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        manifest.validate()?;
        let queries = storage::load_queries(&manifest.queries)?;
        let context = match &manifest.context {
            Some(path) => QueryContext::from_values(storage::load_context(path)?),
            None => QueryContext::new(),
        };
        let store = ResultStore::new(&manifest.results);
        Ok(Self {
            manifest,
            factory,
            fetcher,
            store,
            queries,
            context,
        })
    }

    /// The queries the matrix will run, in execution order.
    pub fn queries(&self) -> &[QuerySpec] {
        &self.queries
    }

    /// Execute every cell of the matrix and return the summary.
    ///
    /// Construction failures skip the configuration's cells and continue
    /// with the next configuration; serialization failures propagate.
    pub async fn execute(&self) -> Result<MatrixSummary> {
        let started_at = Utc::now();
        self.store.prepare().await?;

        let repeat = self.manifest.repeat;
        let total = self.manifest.configs.len() * self.queries.len() * repeat as usize;
        let mut done = 0usize;
        let mut cells = Vec::new();
        let mut failed_configs = Vec::new();

        for config_path in &self.manifest.configs {
            let config_id = storage::file_id(config_path);
            let engine = match self.factory.create(config_path).await {
                Ok(engine) => engine,
                Err(err) => {
                    error!(config = %config_id, "engine construction failed: {err}");
                    failed_configs.push(config_id);
                    done += self.queries.len() * repeat as usize;
                    continue;
                }
            };
            info!(config = %config_id, "engine constructed");

            for query in &self.queries {
                let mut runs: Vec<RunMetrics> = Vec::new();
                let mut state = CellState::Completed;

                for repeat_index in 0..repeat {
                    done += 1;
                    info!(
                        config = %config_id,
                        query = %query.id,
                        repeat = repeat_index,
                        "run {done}/{total}"
                    );
                    let metrics = self.run_once(&engine, query).await;
                    let failed = metrics.is_err();
                    runs.push(metrics);
                    if failed {
                        warn!(
                            config = %config_id,
                            query = %query.id,
                            "run failed, aborting remaining repeats for this cell"
                        );
                        state = CellState::Aborted;
                        break;
                    }
                }

                let path = self
                    .store
                    .write_cell(&config_id, &query.id, &runs)
                    .await?;
                cells.push(CellReport {
                    config_id: config_id.clone(),
                    query_id: query.id.clone(),
                    state,
                    runs_executed: u32::try_from(runs.len()).unwrap_or(u32::MAX),
                    path,
                });
            }
        }

        Ok(MatrixSummary {
            started_at,
            finished_at: Utc::now(),
            cells,
            failed_configs,
        })
    }

    /// Execute one run with fresh instrumentation and fingerprint.
    async fn run_once(&self, engine: &Arc<dyn Engine>, query: &QuerySpec) -> RunMetrics {
        if self.manifest.fresh_measurement {
            if let Err(err) = engine.invalidate_cache().await {
                return self.invalidation_failure(err.to_string());
            }
        }
        let counter = if self.manifest.record_urls {
            RequestCounter::with_links(Arc::clone(&self.fetcher))
        } else {
            RequestCounter::new(Arc::clone(&self.fetcher))
        };
        let fingerprint = Fingerprint::new(
            self.manifest.hash_algorithm,
            self.manifest.digest_encoding,
        );
        QueryExecution::new(
            Arc::clone(engine),
            query.text.as_str(),
            &self.context,
            counter,
            fingerprint,
        )
        .collect()
        .await
    }

    /// A run that never started because the engine's cache could not be
    /// invalidated; reported like any other failed run.
    fn invalidation_failure(&self, message: String) -> RunMetrics {
        let fingerprint = Fingerprint::new(
            self.manifest.hash_algorithm,
            self.manifest.digest_encoding,
        );
        RunMetrics {
            result_hash: fingerprint.digest(),
            result_count: 0,
            result_intervals: Vec::new(),
            request_count: 0,
            request_urls: self.manifest.record_urls.then(Vec::new),
            duration_ms: 0,
            error: Some(format!("cache invalidation failed: {message}")),
        }
    }
}
