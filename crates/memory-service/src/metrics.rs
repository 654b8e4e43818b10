//! In-process metrics counters.
//! No HTTP exposition — that surface is explicitly out of scope (see
//! above); an external layer scrapes `Metrics::snapshot()`. Grounded on
//! `cortex-observability::metrics::MetricsCollector`'s per-domain
//! collector composition, re-expressed with plain atomics instead of a
//! `Mutex`-guarded struct since every counter here is independent.

use std::sync::atomic::{AtomicU64, Ordering};

/// Embedding calls, broken down by cache outcome.
#[derive(Debug, Default)]
pub struct EmbeddingMetrics {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub provider_errors: AtomicU64,
}

/// Two-phase write outcomes.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    pub writes_synced: AtomicU64,
    pub writes_pending: AtomicU64,
    pub writes_failed: AtomicU64,
    pub reconcile_replayed: AtomicU64,
    pub reconcile_permanently_failed: AtomicU64,
}

/// Search call counts and cumulative latency, by strategy.
#[derive(Debug, Default)]
pub struct RetrievalMetrics {
    pub searches: AtomicU64,
    pub total_latency_micros: AtomicU64,
}

impl RetrievalMetrics {
    pub fn record(&self, elapsed: std::time::Duration) {
        self.searches.fetch_add(1, Ordering::Relaxed);
        self.total_latency_micros.fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn mean_latency_micros(&self) -> u64 {
        let count = self.searches.load(Ordering::Relaxed);
        if count == 0 {
            return 0;
        }
        self.total_latency_micros.load(Ordering::Relaxed) / count
    }
}

/// Point-in-time counter values, for an external scraper to serialise.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub embedding_cache_hits: u64,
    pub embedding_cache_misses: u64,
    pub embedding_provider_errors: u64,
    pub sync_writes_synced: u64,
    pub sync_writes_pending: u64,
    pub sync_writes_failed: u64,
    pub sync_reconcile_replayed: u64,
    pub sync_reconcile_permanently_failed: u64,
    pub searches: u64,
    pub search_mean_latency_micros: u64,
}

/// Root metrics registry, one instance per `MemoryService`.
#[derive(Debug, Default)]
pub struct Metrics {
    pub embedding: EmbeddingMetrics,
    pub sync: SyncMetrics,
    pub retrieval: RetrievalMetrics,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            embedding_cache_hits: self.embedding.cache_hits.load(Ordering::Relaxed),
            embedding_cache_misses: self.embedding.cache_misses.load(Ordering::Relaxed),
            embedding_provider_errors: self.embedding.provider_errors.load(Ordering::Relaxed),
            sync_writes_synced: self.sync.writes_synced.load(Ordering::Relaxed),
            sync_writes_pending: self.sync.writes_pending.load(Ordering::Relaxed),
            sync_writes_failed: self.sync.writes_failed.load(Ordering::Relaxed),
            sync_reconcile_replayed: self.sync.reconcile_replayed.load(Ordering::Relaxed),
            sync_reconcile_permanently_failed: self.sync.reconcile_permanently_failed.load(Ordering::Relaxed),
            searches: self.retrieval.searches.load(Ordering::Relaxed),
            search_mean_latency_micros: self.retrieval.mean_latency_micros(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counters() {
        let metrics = Metrics::new();
        metrics.embedding.cache_hits.fetch_add(3, Ordering::Relaxed);
        metrics.retrieval.record(std::time::Duration::from_micros(100));
        metrics.retrieval.record(std::time::Duration::from_micros(300));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.embedding_cache_hits, 3);
        assert_eq!(snapshot.searches, 2);
        assert_eq!(snapshot.search_mean_latency_micros, 200);
    }
}
