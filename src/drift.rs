use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::classify::Classifier;
use crate::codec::MarketRecord;
use crate::error::{Result, SyncError};
use crate::ledger::{AccountFilter, Ledger};
use crate::stats::Stats;
use crate::store::MarketStore;
use crate::types::Address;

/// A ledger market with no row in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftCandidate {
    pub address: Address,
    pub record: MarketRecord,
}

/// Finds ledger markets the store does not know about. Read-only: importing
/// candidates is left to the caller.
pub struct DriftScanner {
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn MarketStore>,
    classifier: Arc<Classifier>,
    program_id: Address,
    market_account_size: Option<u64>,
    stats: Arc<Stats>,
}

impl DriftScanner {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn MarketStore>,
        classifier: Arc<Classifier>,
        program_id: Address,
        stats: Arc<Stats>,
    ) -> Self {
        Self { ledger, store, classifier, program_id, market_account_size: None, stats }
    }

    /// Restricts the listing to accounts of exactly `size` bytes. Only useful
    /// when every market of the deployment is allocated at the same size;
    /// without it the scan pulls every program account and the classifier
    /// sorts them out.
    pub fn with_market_account_size(mut self, size: Option<u64>) -> Self {
        self.market_account_size = size;
        self
    }

    pub async fn find_missing(&self) -> Result<Vec<DriftCandidate>> {
        let filters: Vec<AccountFilter> = self.market_account_size.map(AccountFilter::DataSize).into_iter().collect();
        let accounts = self
            .ledger
            .get_program_accounts(&self.program_id, &filters)
            .await
            .map_err(|source| SyncError::LedgerUnavailable { address: self.program_id, source })?;
        let known: HashSet<Address> = self
            .store
            .read_market_rows()
            .await
            .map_err(SyncError::StoreRead)?
            .into_iter()
            .map(|r| r.address)
            .collect();

        let scanned = accounts.len();
        let mut markets = 0usize;
        let missing: Vec<DriftCandidate> = accounts
            .into_iter()
            .filter_map(|raw| {
                let record = self.classifier.as_market(&raw)?;
                markets += 1;
                (!known.contains(&raw.address)).then_some(DriftCandidate { address: raw.address, record })
            })
            .collect();

        self.stats.set_drift_candidates(missing.len() as u64);
        tracing::info!(scanned, markets, stored = known.len(), missing = missing.len(), "drift scan finished");
        Ok(missing)
    }
}
