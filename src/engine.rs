use std::sync::Arc;

use chrono::Utc;

use crate::cache::{CacheStats, LiveCache};
use crate::classify::Classifier;
use crate::config::EngineConfig;
use crate::drift::{DriftCandidate, DriftScanner};
use crate::error::{Result, SyncError};
use crate::fetch::{option_percentages, FetchService, SnapshotBatch};
use crate::ledger::Ledger;
use crate::participants::ParticipantAggregator;
use crate::reconcile::{BatchReconciler, BatchReport, ReconcileOutcome, ResolutionReconciler};
use crate::stats::Stats;
use crate::store::MarketStore;
use crate::types::{Address, DataSource, MarketRow, MarketSnapshot};

/// Public face of the sync core. Every operation is independently callable
/// and shares only the live cache.
pub struct SyncEngine {
    fetch: Arc<FetchService>,
    resolver: Arc<ResolutionReconciler>,
    batch: BatchReconciler,
    drift: DriftScanner,
    store: Arc<dyn MarketStore>,
    stats: Arc<Stats>,
}

impl SyncEngine {
    pub fn new(
        cfg: &EngineConfig,
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn MarketStore>,
        stats: Arc<Stats>,
    ) -> Result<Self> {
        if cfg.token_decimals > 18 {
            return Err(SyncError::InvalidArgument(format!(
                "token_decimals {} exceeds 18",
                cfg.token_decimals
            )));
        }

        let classifier = Arc::new(Classifier::from_config(&cfg.classifier));
        let participants = ParticipantAggregator::new(ledger.clone(), cfg.program_id, classifier.clone());
        let fetch = Arc::new(FetchService::new(
            ledger.clone(),
            Arc::new(LiveCache::new(cfg.cache_ttl)),
            participants,
            cfg.token_decimals,
            cfg.read_timeout,
            cfg.snapshot_concurrency,
            stats.clone(),
        ));
        let resolver = Arc::new(ResolutionReconciler::new(fetch.clone(), store.clone()));
        let batch = BatchReconciler::new(resolver.clone(), store.clone(), cfg.batch, stats.clone());
        let drift = DriftScanner::new(ledger, store.clone(), classifier, cfg.program_id, stats.clone())
            .with_market_account_size(cfg.market_account_size);

        Ok(Self { fetch, resolver, batch, drift, store, stats })
    }

    pub async fn get_snapshot(&self, address: &Address) -> Result<MarketSnapshot> {
        self.fetch.get_snapshot(address).await
    }

    pub async fn get_snapshot_batch(&self, addresses: &[Address]) -> SnapshotBatch {
        self.fetch.get_snapshot_batch(addresses).await
    }

    /// Live snapshot, or the persisted row when the ledger cannot be reached.
    /// Only an unreachable ledger falls back; a missing or malformed account
    /// is still an error.
    pub async fn get_snapshot_or_fallback(&self, address: &Address) -> Result<MarketSnapshot> {
        let err = match self.fetch.get_snapshot(address).await {
            Ok(snap) => return Ok(snap),
            Err(e @ SyncError::LedgerUnavailable { .. }) => e,
            Err(e) => return Err(e),
        };
        let row = match self.store.read_market_row(address).await {
            Ok(Some(row)) => row,
            Ok(None) => return Err(err),
            Err(source) => return Err(SyncError::StoreRead(source)),
        };
        tracing::warn!(market = %address, error = %err, "ledger unavailable; serving persisted row");
        Ok(fallback_snapshot(&row))
    }

    pub async fn reconcile(&self, address: &Address) -> Result<ReconcileOutcome> {
        self.resolver.reconcile(address).await
    }

    pub async fn reconcile_all(&self) -> Result<BatchReport> {
        self.batch.reconcile_all().await
    }

    pub async fn find_missing(&self) -> Result<Vec<DriftCandidate>> {
        self.drift.find_missing().await
    }

    /// Pushes the live pool figures for one market into its store row.
    pub async fn sync_live_volumes(&self, address: &Address) -> Result<MarketSnapshot> {
        let snap = self.fetch.get_snapshot(address).await?;
        let rows = self
            .store
            .write_live_volumes(address, &snap.option_pools, snap.total_pool, snap.participant_count)
            .await
            .map_err(|source| SyncError::StoreWrite { address: *address, source })?;
        if rows == 0 {
            return Err(SyncError::NotInStore(*address));
        }
        tracing::debug!(market = %address, total = %snap.total_pool, "live volumes written");
        Ok(snap)
    }

    pub fn invalidate_cache(&self, address: Option<&Address>) {
        self.fetch.cache().invalidate(address);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.fetch.cache().stats()
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }
}

fn fallback_snapshot(row: &MarketRow) -> MarketSnapshot {
    MarketSnapshot {
        address: row.address,
        question: row.question.clone(),
        options: row.options.clone(),
        status: row.status,
        winning_option: row.winning_option,
        option_percentages: option_percentages(&row.option_volumes, row.total_volume),
        option_pools: row.option_volumes.clone(),
        total_pool: row.total_volume,
        participant_count: row.participant_count,
        last_updated: Utc::now(),
        data_source: DataSource::PersistedFallback,
    }
}
