use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::types::{Address, MarketSnapshot};

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

struct CacheEntry {
    snapshot: MarketSnapshot,
    fetched_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
    pub ttl_ms: u64,
}

/// Most recent snapshot per market. Expired entries stay in place (and count
/// as expired) until overwritten or invalidated.
pub struct LiveCache {
    entries: DashMap<Address, CacheEntry>,
    ttl: Duration,
}

impl LiveCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, e: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(e.fetched_at) <= self.ttl
    }

    pub fn get(&self, address: &Address) -> Option<MarketSnapshot> {
        let e = self.entries.get(address)?;
        if self.is_fresh(&e, Instant::now()) {
            Some(e.snapshot.clone())
        } else {
            None
        }
    }

    /// Whole-entry replace; readers never observe a half-written slot.
    pub fn put(&self, address: Address, snapshot: MarketSnapshot) {
        self.entries.insert(address, CacheEntry { snapshot, fetched_at: Instant::now() });
    }

    pub fn invalidate(&self, address: Option<&Address>) {
        match address {
            Some(a) => {
                self.entries.remove(a);
                tracing::debug!(address = %a, "cache entry invalidated");
            }
            None => {
                self.entries.clear();
                tracing::debug!("cache cleared");
            }
        }
    }

    /// Counts come from a single pass so concurrent writers cannot make them
    /// disagree with each other.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let (mut total, mut valid) = (0usize, 0usize);
        for e in self.entries.iter() {
            total += 1;
            if self.is_fresh(e.value(), now) {
                valid += 1;
            }
        }
        CacheStats {
            total,
            valid,
            expired: total - valid,
            ttl_ms: self.ttl.as_millis() as u64,
        }
    }
}

impl Default for LiveCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
