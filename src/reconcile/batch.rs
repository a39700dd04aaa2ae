use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use super::resolution::ResolutionReconciler;
use crate::error::{Result, SyncError};
use crate::fetch::AddressError;
use crate::stats::Stats;
use crate::store::MarketStore;
use crate::types::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub window_size: usize,
    pub window_delay: Duration,
    pub max_error_details: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            window_delay: Duration::from_secs(1),
            max_error_details: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatistics {
    pub total_markets: usize,
    pub newly_resolved: usize,
    pub already_resolved: usize,
    pub still_active: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMarket {
    pub address: Address,
    pub question: String,
    pub winning_option: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub run_id: Uuid,
    pub elapsed_ms: u64,
    pub statistics: BatchStatistics,
    pub resolved_markets: Vec<ResolvedMarket>,
    /// First `max_error_details` failures only; every failure is logged.
    pub errors: Vec<AddressError>,
}

/// Drives the resolution reconciler over every stored market in fixed windows,
/// pausing between windows to stay under the ledger endpoint's rate limits.
pub struct BatchReconciler {
    resolver: Arc<ResolutionReconciler>,
    store: Arc<dyn MarketStore>,
    cfg: BatchConfig,
    stats: Arc<Stats>,
}

impl BatchReconciler {
    pub fn new(resolver: Arc<ResolutionReconciler>, store: Arc<dyn MarketStore>, cfg: BatchConfig, stats: Arc<Stats>) -> Self {
        Self { resolver, store, cfg, stats }
    }

    /// Fails only if the market list itself cannot be read.
    pub async fn reconcile_all(&self) -> Result<BatchReport> {
        let started = tokio::time::Instant::now();
        let run_id = Uuid::new_v4();
        let rows = self.store.read_market_rows().await.map_err(SyncError::StoreRead)?;
        let window_size = self.cfg.window_size.max(1);
        let windows = rows.len().div_ceil(window_size);

        tracing::info!(%run_id, markets = rows.len(), windows, "batch reconciliation started");

        let mut statistics = BatchStatistics { total_markets: rows.len(), ..Default::default() };
        let mut resolved_markets = Vec::new();
        let mut errors = Vec::new();

        for (i, window) in rows.chunks(window_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.cfg.window_delay).await;
            }
            tracing::debug!(%run_id, window = i + 1, of = windows, size = window.len(), "reconciling window");

            let results = join_all(window.iter().map(|row| self.resolver.reconcile(&row.address))).await;
            for (row, res) in window.iter().zip(results) {
                match res {
                    Ok(o) if o.updated => {
                        statistics.newly_resolved += 1;
                        if let Some(winning_option) = o.winning_option {
                            resolved_markets.push(ResolvedMarket {
                                address: row.address,
                                question: row.question.clone(),
                                winning_option,
                            });
                        }
                    }
                    Ok(o) if o.was_resolved => statistics.already_resolved += 1,
                    Ok(_) => statistics.still_active += 1,
                    Err(e) => {
                        statistics.errors += 1;
                        tracing::warn!(%run_id, market = %row.address, error = %e, "reconcile failed");
                        if errors.len() < self.cfg.max_error_details {
                            errors.push(AddressError::new(row.address, &e));
                        }
                    }
                }
            }
        }

        self.stats.inc_reconcile_pass();
        self.stats.add_newly_resolved(statistics.newly_resolved as u64);
        self.stats.add_reconcile_errors(statistics.errors as u64);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            %run_id,
            total = statistics.total_markets,
            newly_resolved = statistics.newly_resolved,
            already_resolved = statistics.already_resolved,
            still_active = statistics.still_active,
            errors = statistics.errors,
            elapsed_ms,
            "batch reconciliation finished"
        );

        Ok(BatchReport { run_id, elapsed_ms, statistics, resolved_markets, errors })
    }
}
