//! Single-run execution and metrics collection.
//!
//! A [`QueryExecution`] drives one (engine, query, context) triple to
//! completion: it consumes the engine's result stream, times inter-result
//! gaps, feeds rows to the fingerprint, and produces exactly one
//! [`RunMetrics`] — successful or carrying the error that ended the run.

use crate::engine::{Engine, QueryContext};
use crate::fetch::{Fetcher, RequestCounter};
use crate::fingerprint::Fingerprint;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

// ============================================================================
// Run Metrics
// ============================================================================

/// The measured output of one run.
///
/// On failure, `error` is set and all other fields reflect the partial
/// progress up to the failure point: rows already streamed are still
/// counted, hashed, and timed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Order-independent digest of the result rows received.
    pub result_hash: String,
    /// Number of result rows received.
    pub result_count: u64,
    /// Wall-clock gap in milliseconds before each row, one entry per row.
    pub result_intervals: Vec<u64>,
    /// Network calls made through the run's instrumented fetch capability.
    pub request_count: u64,
    /// Requested URLs in call order, when URL recording is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_urls: Option<Vec<String>>,
    /// Total run duration in milliseconds.
    pub duration_ms: u64,
    /// Description of the failure that ended the run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunMetrics {
    /// Whether the run terminated with an error.
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

// ============================================================================
// Query Execution
// ============================================================================

/// One run of one query against one engine instance.
///
/// Owns a fresh fingerprint and request counter for the lifetime of the
/// run; both are consumed into the resulting [`RunMetrics`].
pub struct QueryExecution {
    engine: Arc<dyn Engine>,
    query: String,
    context: QueryContext,
    counter: Arc<RequestCounter>,
    fingerprint: Fingerprint,
}

impl QueryExecution {
    /// Prepare a run. The base context is copied and merged with the run's
    /// instrumented fetch capability.
    pub fn new(
        engine: Arc<dyn Engine>,
        query: impl Into<String>,
        base_context: &QueryContext,
        counter: Arc<RequestCounter>,
        fingerprint: Fingerprint,
    ) -> Self {
        let context = base_context.with_fetch(Arc::clone(&counter) as Arc<dyn Fetcher>);
        Self {
            engine,
            query: query.into(),
            context,
            counter,
            fingerprint,
        }
    }

    /// Run to the stream's terminal signal and produce the metrics record.
    ///
    /// Consumes the execution: a run has at most one terminal outcome, and
    /// no retry happens here. Submission failures are reported as a record
    /// with zero rows; mid-stream failures keep the partial counters,
    /// intervals, and digest accumulated before the error.
    pub async fn collect(mut self) -> RunMetrics {
        let started = Instant::now();
        let mut previous = started;
        let mut intervals: Vec<u64> = Vec::new();
        let mut result_count: u64 = 0;
        let mut error: Option<String> = None;

        match self.engine.submit_query(&self.query, &self.context).await {
            Ok(mut stream) => {
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(row) => {
                            let now = Instant::now();
                            intervals.push(millis(now.duration_since(previous)));
                            previous = now;
                            self.fingerprint.add(&row);
                            result_count += 1;
                        }
                        Err(err) => {
                            error = Some(err.to_string());
                            break;
                        }
                    }
                }
            }
            Err(err) => error = Some(err.to_string()),
        }

        let duration_ms = millis(started.elapsed());
        debug!(
            engine = self.engine.id(),
            results = result_count,
            requests = self.counter.count(),
            duration_ms,
            failed = error.is_some(),
            "run finished"
        );

        RunMetrics {
            result_hash: self.fingerprint.digest(),
            result_count,
            result_intervals: intervals,
            request_count: self.counter.count(),
            request_urls: self.counter.links(),
            duration_ms,
            error,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
