//! Fetch capability and request instrumentation.
//!
//! Engines issue network calls through a [`Fetcher`] capability handed to
//! them via the query context. Each run wraps the shared underlying fetcher
//! in a private [`RequestCounter`] so call counts never leak across runs.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Fetch Capability
// ============================================================================

/// An outbound network request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl FetchRequest {
    /// Create a GET request for the given URL.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }
}

/// A response from the fetch capability.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// A fetch-style network capability: `(request) -> Response`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request and return the response.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;
}

/// Placeholder capability for harness invocations without a network
/// collaborator: every call fails, but calls are still observable through
/// the wrapping [`RequestCounter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFetcher;

#[async_trait]
impl Fetcher for NullFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        Err(crate::error::Error::fetch(format!(
            "no network capability configured for {}",
            request.url
        )))
    }
}

// ============================================================================
// Request Counter
// ============================================================================

/// Counting decorator around a [`Fetcher`].
///
/// Delegates every call to the wrapped fetcher unmodified — no caching,
/// retry, or request mutation — while incrementing a monotonic call counter
/// and, when enabled, appending the requested URL to an ordered log. Both
/// are observable at any time during the run.
pub struct RequestCounter {
    inner: Arc<dyn Fetcher>,
    count: AtomicU64,
    links: Option<Mutex<Vec<String>>>,
}

impl RequestCounter {
    /// Wrap a fetcher, counting calls only.
    pub fn new(inner: Arc<dyn Fetcher>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            count: AtomicU64::new(0),
            links: None,
        })
    }

    /// Wrap a fetcher, counting calls and recording requested URLs.
    pub fn with_links(inner: Arc<dyn Fetcher>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            count: AtomicU64::new(0),
            links: Some(Mutex::new(Vec::new())),
        })
    }

    /// Number of calls made through this counter so far.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Snapshot of the requested URLs, in call order, when recording is
    /// enabled.
    pub fn links(&self) -> Option<Vec<String>> {
        self.links
            .as_ref()
            .map(|links| links.lock().expect("request link log poisoned").clone())
    }
}

#[async_trait]
impl Fetcher for RequestCounter {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        self.count.fetch_add(1, Ordering::SeqCst);
        if let Some(links) = &self.links {
            links
                .lock()
                .expect("request link log poisoned")
                .push(request.url.clone());
        }
        self.inner.fetch(request).await
    }
}

impl std::fmt::Debug for RequestCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCounter")
            .field("count", &self.count())
            .field("links", &self.links.is_some())
            .finish()
    }
}
