//! Deterministic replay engine.
//!
//! The replay engine streams result rows out of a JSON fixture file instead
//! of answering queries, which makes whole-matrix runs reproducible: the
//! binary works against it out of the box and the end-to-end tests use it to
//! exercise the full pipeline without a live engine. A fixture can script a
//! submission rejection or a mid-stream failure to replay error scenarios.

use crate::engine::{Engine, EngineFactory, QueryContext, ResultRow, RowStream};
use crate::error::{Error, Result};
use crate::fetch::FetchRequest;
use crate::storage;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Fixture Format
// ============================================================================

/// On-disk shape of a replay engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ReplayConfig {
    /// Result rows, streamed in order. Values are stringified.
    rows: Vec<serde_json::Map<String, Value>>,

    /// URLs the engine fetches through the run's fetch capability at
    /// submission time, simulating its network traffic.
    requests: Vec<String>,

    /// Reject the query at submission instead of streaming.
    reject: bool,

    /// Fail the stream after this many rows.
    fail_after: Option<usize>,

    /// Error message used for scripted rejections and stream failures.
    error: Option<String>,

    /// Delay before each row, in milliseconds.
    delay_ms: u64,
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Replay Engine
// ============================================================================

/// An [`Engine`] that replays rows from a fixture.
pub struct ReplayEngine {
    id: String,
    config: ReplayConfig,
    invalidations: AtomicU64,
}

impl ReplayEngine {
    /// Number of cache invalidations requested so far.
    pub fn invalidation_count(&self) -> u64 {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Engine for ReplayEngine {
    fn id(&self) -> &str {
        &self.id
    }

    async fn submit_query(&self, _query: &str, context: &QueryContext) -> Result<RowStream> {
        if self.config.reject {
            let message = self
                .config
                .error
                .clone()
                .unwrap_or_else(|| "scripted rejection".to_string());
            return Err(Error::submission(message));
        }

        if let Some(fetch) = context.fetch() {
            for url in &self.config.requests {
                // Replayed traffic; individual failures are the fetcher's
                // to report and do not end the run.
                let _ = fetch.fetch(FetchRequest::get(url.clone())).await;
            }
        }

        let mut items: Vec<Result<ResultRow>> = self
            .config
            .rows
            .iter()
            .map(|row| {
                Ok(row
                    .iter()
                    .map(|(name, value)| (name.clone(), value_text(value)))
                    .collect())
            })
            .collect();
        if let Some(after) = self.config.fail_after {
            items.truncate(after);
            let message = self
                .config
                .error
                .clone()
                .unwrap_or_else(|| "scripted stream failure".to_string());
            items.push(Err(Error::stream(message)));
        }

        let delay = self.config.delay_ms;
        if delay == 0 {
            Ok(Box::pin(stream::iter(items)))
        } else {
            Ok(Box::pin(stream::iter(items).then(move |item| async move {
                asupersync::time::sleep(asupersync::time::wall_now(), Duration::from_millis(delay))
                    .await;
                item
            })))
        }
    }

    async fn invalidate_cache(&self) -> Result<()> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Replay Engine Factory
// ============================================================================

/// Builds [`ReplayEngine`]s from fixture files.
#[derive(Debug, Clone, Default)]
pub struct ReplayEngineFactory;

#[async_trait]
impl EngineFactory for ReplayEngineFactory {
    async fn create(&self, config_path: &Path) -> Result<Arc<dyn Engine>> {
        let display = config_path.display().to_string();
        let content = std::fs::read_to_string(config_path)
            .map_err(|err| Error::construction(&display, err.to_string()))?;
        let config: ReplayConfig = serde_json::from_str(&content)
            .map_err(|err| Error::construction(&display, err.to_string()))?;
        Ok(Arc::new(ReplayEngine {
            id: storage::file_id(config_path),
            config,
            invalidations: AtomicU64::new(0),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn write_fixture(dir: &Path, name: &str, json: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn streams_fixture_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            "engine.json",
            r#"{"rows": [{"s": "a"}, {"s": "b"}, {"n": 7}]}"#,
        );
        let engine = block_on(ReplayEngineFactory.create(&path)).unwrap();
        assert_eq!(engine.id(), "engine");
        let rows: Vec<ResultRow> = block_on(async {
            let stream = engine
                .submit_query("SELECT * WHERE { ?s ?p ?o }", &QueryContext::new())
                .await
                .unwrap();
            stream.map(|item| item.unwrap()).collect().await
        });
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("s"), Some("a"));
        assert_eq!(rows[2].get("n"), Some("7"));
    }

    #[test]
    fn scripted_rejection_is_a_submission_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            "reject.json",
            r#"{"reject": true, "error": "no answer today"}"#,
        );
        let engine = block_on(ReplayEngineFactory.create(&path)).unwrap();
        let err = block_on(engine.submit_query("ASK {}", &QueryContext::new())).unwrap_err();
        assert!(matches!(err, Error::Submission(_)));
        assert!(err.to_string().contains("no answer today"));
    }

    #[test]
    fn fail_after_truncates_and_appends_stream_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            "flaky.json",
            r#"{"rows": [{"s": "a"}, {"s": "b"}, {"s": "c"}], "fail_after": 1}"#,
        );
        let engine = block_on(ReplayEngineFactory.create(&path)).unwrap();
        let items: Vec<Result<ResultRow>> = block_on(async {
            let stream = engine
                .submit_query("SELECT", &QueryContext::new())
                .await
                .unwrap();
            stream.collect().await
        });
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::Stream(_))));
    }

    #[test]
    fn missing_or_invalid_fixture_is_a_construction_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = block_on(ReplayEngineFactory.create(&missing)).unwrap_err();
        assert!(matches!(err, Error::Construction { .. }));

        let invalid = write_fixture(dir.path(), "invalid.json", "not json at all");
        let err = block_on(ReplayEngineFactory.create(&invalid)).unwrap_err();
        assert!(matches!(err, Error::Construction { .. }));
    }

    #[test]
    fn invalidation_counter_increments() {
        let engine = ReplayEngine {
            id: "engine".to_string(),
            config: ReplayConfig::default(),
            invalidations: AtomicU64::new(0),
        };
        block_on(engine.invalidate_cache()).unwrap();
        block_on(engine.invalidate_cache()).unwrap();
        assert_eq!(engine.invalidation_count(), 2);
    }
}
