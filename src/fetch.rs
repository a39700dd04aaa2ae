use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::cache::LiveCache;
use crate::codec::{decode_market, MarketRecord};
use crate::error::{LedgerError, Result, SyncError};
use crate::ledger::Ledger;
use crate::participants::ParticipantAggregator;
use crate::stats::Stats;
use crate::types::{Address, DataSource, MarketSnapshot};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressError {
    pub address: Address,
    pub error: String,
    pub retryable: bool,
}

impl AddressError {
    pub fn new(address: Address, err: &SyncError) -> Self {
        Self { address, error: err.to_string(), retryable: err.is_retryable() }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotBatch {
    pub snapshots: Vec<MarketSnapshot>,
    pub errors: Vec<AddressError>,
}

/// Turns market addresses into snapshots, serving from the live cache when it
/// can and reading the ledger when it must.
pub struct FetchService {
    ledger: Arc<dyn Ledger>,
    cache: Arc<LiveCache>,
    participants: ParticipantAggregator,
    token_decimals: u32,
    read_timeout: Duration,
    concurrency: usize,
    stats: Arc<Stats>,
}

impl FetchService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        cache: Arc<LiveCache>,
        participants: ParticipantAggregator,
        token_decimals: u32,
        read_timeout: Duration,
        concurrency: usize,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            ledger,
            cache,
            participants,
            token_decimals,
            read_timeout,
            concurrency: concurrency.max(1),
            stats,
        }
    }

    pub fn cache(&self) -> &Arc<LiveCache> {
        &self.cache
    }

    /// One uncached, time-bounded account read, decoded.
    pub async fn read_market(&self, address: &Address) -> Result<MarketRecord> {
        self.stats.inc_ledger_read();
        let read = tokio::time::timeout(self.read_timeout, self.ledger.get_account_info(address)).await;
        let bytes = match read {
            Err(_) => {
                return Err(SyncError::LedgerUnavailable {
                    address: *address,
                    source: LedgerError::Timeout(self.read_timeout),
                })
            }
            Ok(Err(source)) => return Err(SyncError::LedgerUnavailable { address: *address, source }),
            Ok(Ok(None)) => return Err(SyncError::NotFound(*address)),
            Ok(Ok(Some(b))) => b,
        };
        decode_market(&bytes).map_err(|source| {
            self.stats.inc_decode_reject();
            SyncError::Malformed { address: *address, source }
        })
    }

    pub async fn get_snapshot(&self, address: &Address) -> Result<MarketSnapshot> {
        if let Some(mut snap) = self.cache.get(address) {
            self.stats.inc_cache_hit();
            tracing::debug!(market = %address, "snapshot served from cache");
            snap.data_source = DataSource::Cache;
            return Ok(snap);
        }
        self.stats.inc_cache_miss();

        let record = self.read_market(address).await?;
        let participant_count = self.participants.count_participants(address).await;
        let snap = build_snapshot(*address, &record, self.token_decimals, participant_count, Utc::now());
        self.cache.put(*address, snap.clone());

        tracing::info!(
            market = %address,
            status = ?snap.status,
            total_pool = %snap.total_pool,
            participants = snap.participant_count,
            "live snapshot fetched"
        );
        Ok(snap)
    }

    /// Fetches every address independently; one failure never fails the batch.
    pub async fn get_snapshot_batch(&self, addresses: &[Address]) -> SnapshotBatch {
        let mut out = SnapshotBatch::default();
        let mut results = stream::iter(addresses.iter().copied().map(|address| async move {
            (address, self.get_snapshot(&address).await)
        }))
        .buffer_unordered(self.concurrency);

        while let Some((address, res)) = results.next().await {
            match res {
                Ok(snap) => out.snapshots.push(snap),
                Err(e) => {
                    tracing::warn!(market = %address, error = %e, "snapshot failed");
                    out.errors.push(AddressError::new(address, &e));
                }
            }
        }
        out
    }
}

/// Raw integer amount in display units.
pub fn to_display(raw: u64, decimals: u32) -> Decimal {
    Decimal::from_i128_with_scale(raw as i128, decimals).normalize()
}

/// Per-option share of the pool. An empty pool reports zero for every option.
pub fn option_percentages(pools: &[Decimal], total: Decimal) -> Vec<Decimal> {
    if total <= Decimal::ZERO {
        return vec![Decimal::ZERO; pools.len()];
    }
    pools.iter().map(|p| *p * dec!(100) / total).collect()
}

pub(crate) fn build_snapshot(
    address: Address,
    record: &MarketRecord,
    token_decimals: u32,
    participant_count: u64,
    now: DateTime<Utc>,
) -> MarketSnapshot {
    let option_pools: Vec<Decimal> = record.option_pools.iter().map(|p| to_display(*p, token_decimals)).collect();
    let total_pool: Decimal = option_pools.iter().copied().sum();
    MarketSnapshot {
        address,
        question: record.question.clone(),
        options: record.options.clone(),
        status: record.status,
        winning_option: record.winning_option,
        option_percentages: option_percentages(&option_pools, total_pool),
        option_pools,
        total_pool,
        participant_count,
        last_updated: now,
        data_source: DataSource::LiveLedger,
    }
}
