//! Result cache: a policy layer over a raw key-value store.
//!
//! The one invariant that matters here: **at most one concurrent compute per
//! fingerprint**. Two identical queries landing microseconds apart must
//! produce exactly one fan-out; the second caller waits for and shares the
//! in-flight result. The claim is made atomically through a per-fingerprint
//! cell handed out under a lock, so there is no window where two callers can
//! both decide to compute.
//!
//! A compute that fails entirely is never stored — a transient global outage
//! must not poison the cache for a whole TTL window.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio::time::Instant;

use pricelens_core::SearchResult;

use crate::error::OrchestratorError;

/// External key-value collaborator. Implementations own expiry bookkeeping;
/// `get` must never return an entry past its TTL.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);
}

/// In-memory store with lazy expiry: stale entries are dropped on the next
/// lookup rather than by a background sweep.
#[derive(Default)]
pub struct MemoryStore {
    entries: tokio::sync::Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.remove(key);
                None
            }
            Some((bytes, _)) => Some(bytes.clone()),
            None => None,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), (value, Instant::now() + ttl));
    }
}

type Flight = Arc<OnceCell<SearchResult>>;

pub struct ResultCache {
    store: Arc<dyn KeyValueStore>,
    flights: StdMutex<HashMap<String, Flight>>,
}

impl ResultCache {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            flights: StdMutex::new(HashMap::new()),
        }
    }

    /// Returns the cached result for `fingerprint`, or runs `compute` —
    /// exactly once across concurrent callers — and stores its result.
    ///
    /// Cache hits come back with `cached = true`. Results where no merchant
    /// responded cannot occur (`compute` fails instead), so everything
    /// stored has at least one successful source.
    ///
    /// # Errors
    ///
    /// Propagates `compute`'s [`OrchestratorError`]; failed computes are not
    /// stored.
    pub async fn get_or_compute<F, Fut>(
        &self,
        fingerprint: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<SearchResult, OrchestratorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SearchResult, OrchestratorError>>,
    {
        if let Some(result) = self.lookup(fingerprint).await {
            return Ok(result);
        }

        let flight = self.claim(fingerprint);

        let outcome = flight
            .get_or_try_init(|| async move {
                // A previous flight may have completed between our store miss
                // and the claim.
                if let Some(result) = self.lookup(fingerprint).await {
                    return Ok(result);
                }

                let computed = compute().await?;
                if let Ok(bytes) = serde_json::to_vec(&computed) {
                    self.store.set(fingerprint, bytes, ttl).await;
                } else {
                    tracing::warn!(fingerprint, "search result did not serialize; not cached");
                }
                Ok(computed)
            })
            .await
            .cloned();

        self.release(fingerprint);

        outcome
    }

    async fn lookup(&self, fingerprint: &str) -> Option<SearchResult> {
        let bytes = self.store.get(fingerprint).await?;
        match serde_json::from_slice::<SearchResult>(&bytes) {
            Ok(mut result) => {
                result.cached = true;
                Some(result)
            }
            Err(e) => {
                tracing::warn!(fingerprint, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    fn claim(&self, fingerprint: &str) -> Flight {
        let mut flights = self.flights.lock().expect("cache flights poisoned");
        Arc::clone(
            flights
                .entry(fingerprint.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        )
    }

    fn release(&self, fingerprint: &str) {
        let mut flights = self.flights.lock().expect("cache flights poisoned");
        flights.remove(fingerprint);
    }
}
