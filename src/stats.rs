use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct Stats {
    start_ms: AtomicU64,
    last_log_ms: AtomicU64,

    ledger_reads: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    decode_rejects: AtomicU64,

    reconcile_passes: AtomicU64,
    newly_resolved: AtomicU64,
    reconcile_errors: AtomicU64,

    drift_candidates: AtomicU64,
}

impl Stats {
    pub fn new(now_ms: u64) -> Arc<Self> {
        let s = Arc::new(Self::default());
        s.start_ms.store(now_ms, Ordering::Relaxed);
        s.last_log_ms.store(now_ms, Ordering::Relaxed);
        s
    }

    pub fn inc_ledger_read(&self) {
        self.ledger_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_decode_reject(&self) {
        self.decode_rejects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reconcile_pass(&self) {
        self.reconcile_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_newly_resolved(&self, n: u64) {
        self.newly_resolved.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_reconcile_errors(&self, n: u64) {
        self.reconcile_errors.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_drift_candidates(&self, n: u64) {
        self.drift_candidates.store(n, Ordering::Relaxed);
    }

    pub fn should_log(&self, now_ms: u64, every_sec: u64) -> bool {
        if every_sec == 0 { return false; }
        let last = self.last_log_ms.load(Ordering::Relaxed);
        now_ms.saturating_sub(last) >= every_sec.saturating_mul(1000)
    }

    pub fn mark_logged(&self, now_ms: u64) {
        self.last_log_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self, now_ms: u64) -> StatsSnapshot {
        let start = self.start_ms.load(Ordering::Relaxed);
        StatsSnapshot {
            now_ms,
            up_sec: now_ms.saturating_sub(start) / 1000,
            ledger_reads: self.ledger_reads.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            decode_rejects: self.decode_rejects.load(Ordering::Relaxed),
            reconcile_passes: self.reconcile_passes.load(Ordering::Relaxed),
            newly_resolved: self.newly_resolved.load(Ordering::Relaxed),
            reconcile_errors: self.reconcile_errors.load(Ordering::Relaxed),
            drift_candidates: self.drift_candidates.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub now_ms: u64,
    pub up_sec: u64,
    pub ledger_reads: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub decode_rejects: u64,
    pub reconcile_passes: u64,
    pub newly_resolved: u64,
    pub reconcile_errors: u64,
    pub drift_candidates: u64,
}
