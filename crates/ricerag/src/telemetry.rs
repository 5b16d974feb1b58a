//! Lightweight engine counters, snapshot-readable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Atomic counters updated on the hot path; read via [`snapshot`].
///
/// [`snapshot`]: RetrievalTelemetry::snapshot
#[derive(Debug, Default)]
pub struct RetrievalTelemetry {
    searches: AtomicU64,
    degraded_searches: AtomicU64,
    empty_pools: AtomicU64,
    backend_calls: AtomicU64,
    backend_ns: AtomicU64,
    embedding_cache_hits: AtomicU64,
    embedding_cache_misses: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl RetrievalTelemetry {
    pub fn record_search(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degraded(&self) {
        self.degraded_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty_pool(&self) {
        self.empty_pools.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend(&self, latency: Duration) {
        self.backend_calls.fetch_add(1, Ordering::Relaxed);
        self.backend_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.embedding_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.embedding_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, message: &str) {
        let mut guard = self.last_error.lock();
        *guard = Some(message.to_string());
    }

    pub fn snapshot(&self) -> RetrievalTelemetrySnapshot {
        let backend_calls = self.backend_calls.load(Ordering::Relaxed);
        let backend_ns = self.backend_ns.load(Ordering::Relaxed);
        let avg_backend_latency_ms = if backend_calls > 0 {
            backend_ns as f64 / backend_calls as f64 / 1_000_000.0
        } else {
            0.0
        };
        RetrievalTelemetrySnapshot {
            searches: self.searches.load(Ordering::Relaxed),
            degraded_searches: self.degraded_searches.load(Ordering::Relaxed),
            empty_pools: self.empty_pools.load(Ordering::Relaxed),
            backend_calls,
            avg_backend_latency_ms,
            embedding_cache_hits: self.embedding_cache_hits.load(Ordering::Relaxed),
            embedding_cache_misses: self.embedding_cache_misses.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalTelemetrySnapshot {
    pub searches: u64,
    pub degraded_searches: u64,
    pub empty_pools: u64,
    pub backend_calls: u64,
    pub avg_backend_latency_ms: f64,
    pub embedding_cache_hits: u64,
    pub embedding_cache_misses: u64,
    pub last_error: Option<String>,
}
