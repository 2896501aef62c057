//! End-to-end matrix runs over replay and scripted engines.
//!
//! These tests drive the full pipeline — manifest resolution, engine
//! construction, sequential run execution, per-cell result files — through
//! temp directories, the way the binary runs it.

use async_trait::async_trait;
use futures::stream;
use qbench::config::Manifest;
use qbench::engine::{Engine, EngineFactory, QueryContext, ResultRow, RowStream};
use qbench::error::Result;
use qbench::executor::RunMetrics;
use qbench::fetch::NullFetcher;
use qbench::fingerprint::{DigestEncoding, Fingerprint, HashAlgorithm};
use qbench::matrix::{CellState, MatrixDriver};
use qbench::replay::ReplayEngineFactory;
use qbench::storage;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn run_async<T>(future: impl Future<Output = T>) -> T {
    let runtime = asupersync::runtime::RuntimeBuilder::current_thread()
        .build()
        .expect("build runtime");
    runtime.block_on(future)
}

fn write(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

fn read_cell(path: &Path) -> Vec<RunMetrics> {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn replay_driver(manifest: Manifest) -> MatrixDriver {
    MatrixDriver::new(
        manifest,
        Arc::new(ReplayEngineFactory),
        Arc::new(NullFetcher),
    )
    .unwrap()
}

#[test]
fn full_matrix_over_replay_engines() {
    let dir = tempfile::tempdir().unwrap();
    let engines = dir.path().join("engines");
    std::fs::create_dir(&engines).unwrap();
    write(
        &engines.join("forward.json"),
        r#"{"rows": [{"s": "alpha", "o": "1"}, {"s": "beta", "o": "2"}],
            "requests": ["http://data.example/a", "http://data.example/b"]}"#,
    );
    write(
        &engines.join("reversed.json"),
        r#"{"rows": [{"o": "2", "s": "beta"}, {"o": "1", "s": "alpha"}]}"#,
    );
    let queries = dir.path().join("queries");
    std::fs::create_dir(&queries).unwrap();
    write(&queries.join("spo.rq"), "SELECT * WHERE { ?s ?p ?o }");

    let manifest = Manifest {
        configs: vec![engines.join("forward.json"), engines.join("reversed.json")],
        queries: vec![queries],
        results: dir.path().join("results"),
        repeat: 2,
        ..Manifest::default()
    };
    let summary = run_async(replay_driver(manifest).execute()).unwrap();

    assert_eq!(summary.cells.len(), 2);
    assert!(summary.failed_configs.is_empty());

    let forward = read_cell(&dir.path().join("results").join("forward--spo.json"));
    let reversed = read_cell(&dir.path().join("results").join("reversed--spo.json"));
    assert_eq!(forward.len(), 2);
    assert_eq!(reversed.len(), 2);

    // Same answer multiset in different delivery order: identical digests,
    // within a cell and across configurations.
    assert_eq!(forward[0].result_hash, forward[1].result_hash);
    assert_eq!(forward[0].result_hash, reversed[0].result_hash);

    // Each run observed two rows and one interval per row.
    for run in forward.iter().chain(reversed.iter()) {
        assert!(!run.is_err());
        assert_eq!(run.result_count, 2);
        assert_eq!(run.result_intervals.len(), 2);
    }

    // The forward engine's replayed traffic is attributed per run.
    assert_eq!(forward[0].request_count, 2);
    assert_eq!(
        forward[0].request_urls.clone().unwrap(),
        ["http://data.example/a", "http://data.example/b"]
    );
    assert_eq!(reversed[0].request_count, 0);
}

#[test]
fn aborted_cell_keeps_partial_metrics_of_failing_run() {
    let dir = tempfile::tempdir().unwrap();
    let engine = dir.path().join("flaky.json");
    write(
        &engine,
        r#"{"rows": [{"s": "a"}, {"s": "b"}, {"s": "c"}], "fail_after": 2,
            "error": "upstream gone"}"#,
    );
    let query = dir.path().join("q.rq");
    write(&query, "SELECT * WHERE { ?s ?p ?o }");

    let manifest = Manifest {
        configs: vec![engine],
        queries: vec![query],
        results: dir.path().join("results"),
        repeat: 3,
        ..Manifest::default()
    };
    let summary = run_async(replay_driver(manifest).execute()).unwrap();

    assert_eq!(summary.cells[0].state, CellState::Aborted);
    let runs = read_cell(&summary.cells[0].path);
    // First run fails, remaining repeats are neither executed nor recorded.
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].result_count, 2);
    assert_eq!(runs[0].result_intervals.len(), 2);
    assert!(runs[0].error.as_deref().unwrap().contains("upstream gone"));

    // The partial digest covers exactly the rows that arrived.
    let mut fingerprint = Fingerprint::new(HashAlgorithm::Sha256, DigestEncoding::Hex);
    fingerprint.add(&[("s", "a")].into_iter().collect());
    fingerprint.add(&[("s", "b")].into_iter().collect());
    assert_eq!(runs[0].result_hash, fingerprint.digest());
}

#[test]
fn result_file_shape_matches_run_metrics_contract() {
    let dir = tempfile::tempdir().unwrap();
    let engine = dir.path().join("engine.json");
    write(&engine, r#"{"rows": [{"s": "a"}]}"#);
    let query = dir.path().join("q.rq");
    write(&query, "SELECT ?s WHERE { ?s ?p ?o }");

    let manifest = Manifest {
        configs: vec![engine],
        queries: vec![query],
        results: dir.path().join("results"),
        ..Manifest::default()
    };
    let summary = run_async(replay_driver(manifest).execute()).unwrap();

    let text = std::fs::read_to_string(&summary.cells[0].path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    let run = &value.as_array().unwrap()[0];
    for key in [
        "result_hash",
        "result_count",
        "result_intervals",
        "request_count",
        "request_urls",
        "duration_ms",
    ] {
        assert!(run.get(key).is_some(), "missing key {key}");
    }
    // Successful runs omit the error field entirely.
    assert!(run.get("error").is_none());
}

// ============================================================================
// Scripted engines: construction policy and context plumbing
// ============================================================================

struct CountingFactory {
    created: Arc<AtomicU64>,
    invalidated: Arc<AtomicU64>,
}

struct CountingEngine {
    id: String,
    invalidated: Arc<AtomicU64>,
}

#[async_trait]
impl EngineFactory for CountingFactory {
    async fn create(&self, config_path: &Path) -> Result<Arc<dyn Engine>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CountingEngine {
            id: storage::file_id(config_path),
            invalidated: Arc::clone(&self.invalidated),
        }))
    }
}

#[async_trait]
impl Engine for CountingEngine {
    fn id(&self) -> &str {
        &self.id
    }

    async fn submit_query(&self, _query: &str, context: &QueryContext) -> Result<RowStream> {
        // Echo the opaque context value back as the single result row, so
        // the test can observe the context reached the engine intact.
        let graph = context
            .value("graph")
            .and_then(|value| value.as_str())
            .unwrap_or("unset")
            .to_string();
        let row: ResultRow = [("graph", graph)].into_iter().collect();
        Ok(Box::pin(stream::iter(vec![Ok(row)])))
    }

    async fn invalidate_cache(&self) -> Result<()> {
        self.invalidated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn engine_is_reused_across_queries_and_invalidated_per_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("engine.json");
    write(&config, "{}");
    let queries = dir.path().join("queries");
    std::fs::create_dir(&queries).unwrap();
    write(&queries.join("q1.rq"), "SELECT 1");
    write(&queries.join("q2.rq"), "SELECT 2");
    write(&queries.join("q3.rq"), "SELECT 3");

    let created = Arc::new(AtomicU64::new(0));
    let invalidated = Arc::new(AtomicU64::new(0));
    let factory = CountingFactory {
        created: Arc::clone(&created),
        invalidated: Arc::clone(&invalidated),
    };

    let manifest = Manifest {
        configs: vec![config],
        queries: vec![queries],
        results: dir.path().join("results"),
        repeat: 2,
        ..Manifest::default()
    };
    let driver = MatrixDriver::new(manifest, Arc::new(factory), Arc::new(NullFetcher)).unwrap();
    let summary = run_async(driver.execute()).unwrap();

    assert_eq!(summary.cells.len(), 3);
    // One engine per configuration, shared by all of its queries.
    assert_eq!(created.load(Ordering::SeqCst), 1);
    // Fresh measurement invalidates before every run: 3 queries × 2 repeats.
    assert_eq!(invalidated.load(Ordering::SeqCst), 6);
}

#[test]
fn keep_caches_skips_invalidation() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("engine.json");
    write(&config, "{}");
    let query = dir.path().join("q.rq");
    write(&query, "SELECT 1");

    let created = Arc::new(AtomicU64::new(0));
    let invalidated = Arc::new(AtomicU64::new(0));
    let factory = CountingFactory {
        created: Arc::clone(&created),
        invalidated: Arc::clone(&invalidated),
    };

    let manifest = Manifest {
        configs: vec![config],
        queries: vec![query],
        results: dir.path().join("results"),
        repeat: 4,
        fresh_measurement: false,
        ..Manifest::default()
    };
    let driver = MatrixDriver::new(manifest, Arc::new(factory), Arc::new(NullFetcher)).unwrap();
    run_async(driver.execute()).unwrap();

    assert_eq!(invalidated.load(Ordering::SeqCst), 0);
}

#[test]
fn context_file_values_reach_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("engine.json");
    write(&config, "{}");
    let query = dir.path().join("q.rq");
    write(&query, "SELECT ?graph");
    let context = dir.path().join("context.json");
    write(&context, r#"{"graph": "http://graphs.example/g1"}"#);

    let factory = CountingFactory {
        created: Arc::new(AtomicU64::new(0)),
        invalidated: Arc::new(AtomicU64::new(0)),
    };

    let manifest = Manifest {
        configs: vec![config],
        queries: vec![query],
        results: dir.path().join("results"),
        context: Some(context),
        ..Manifest::default()
    };
    let driver = MatrixDriver::new(manifest, Arc::new(factory), Arc::new(NullFetcher)).unwrap();
    let summary = run_async(driver.execute()).unwrap();

    let runs = read_cell(&summary.cells[0].path);
    let mut fingerprint = Fingerprint::new(HashAlgorithm::Sha256, DigestEncoding::Hex);
    fingerprint.add(&[("graph", "http://graphs.example/g1")].into_iter().collect());
    assert_eq!(runs[0].result_hash, fingerprint.digest());
}
