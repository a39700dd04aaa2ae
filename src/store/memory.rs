use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::MarketStore;
use crate::types::{Address, MarketRow, MarketStatus};

/// In-process store keyed by address.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<BTreeMap<Address, MarketRow>>,
    resolution_writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: impl IntoIterator<Item = MarketRow>) -> Self {
        Self {
            rows: RwLock::new(rows.into_iter().map(|r| (r.address, r)).collect()),
            resolution_writes: AtomicU64::new(0),
        }
    }

    /// Inserts or replaces a row.
    pub async fn upsert(&self, row: MarketRow) {
        self.rows.write().await.insert(row.address, row);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    pub fn resolution_writes(&self) -> u64 {
        self.resolution_writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn read_market_rows(&self) -> anyhow::Result<Vec<MarketRow>> {
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn read_market_row(&self, address: &Address) -> anyhow::Result<Option<MarketRow>> {
        Ok(self.rows.read().await.get(address).cloned())
    }

    async fn write_market_resolution(&self, address: &Address, winning_option: u8) -> anyhow::Result<u64> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(address) else {
            return Ok(0);
        };
        row.status = MarketStatus::Resolved;
        row.winning_option = Some(winning_option);
        self.resolution_writes.fetch_add(1, Ordering::Relaxed);
        Ok(1)
    }

    async fn write_live_volumes(
        &self,
        address: &Address,
        option_pools: &[Decimal],
        total_volume: Decimal,
        participant_count: u64,
    ) -> anyhow::Result<u64> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(address) else {
            return Ok(0);
        };
        row.option_volumes = option_pools.to_vec();
        row.total_volume = total_volume;
        row.participant_count = participant_count;
        Ok(1)
    }
}
