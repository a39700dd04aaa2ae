use std::sync::Arc;

use serde::Serialize;

use crate::error::{DecodeError, Result, SyncError};
use crate::fetch::FetchService;
use crate::store::MarketStore;
use crate::types::{Address, MarketStatus};

/// Informational disagreements that do not lead to a store write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileNote {
    /// Store says resolved, ledger read says active. The store is left alone.
    StillActiveOnLedger,
    /// Store and ledger both resolved but disagree on the winner.
    WinnerMismatch { ledger: u8 },
    /// Cancellation is not reconciled.
    CancelledOnLedger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub address: Address,
    /// Persisted settlement after this call.
    pub was_resolved: bool,
    pub status: MarketStatus,
    pub winning_option: Option<u8>,
    /// A store write happened during this call.
    pub updated: bool,
    pub ledger_status: MarketStatus,
    pub note: Option<ReconcileNote>,
}

/// Pulls settlement for one market from the ledger into the store. The store
/// only ever moves Active -> Resolved.
pub struct ResolutionReconciler {
    fetch: Arc<FetchService>,
    store: Arc<dyn MarketStore>,
}

impl ResolutionReconciler {
    pub fn new(fetch: Arc<FetchService>, store: Arc<dyn MarketStore>) -> Self {
        Self { fetch, store }
    }

    pub async fn reconcile(&self, address: &Address) -> Result<ReconcileOutcome> {
        let row = self
            .store
            .read_market_row(address)
            .await
            .map_err(SyncError::StoreRead)?
            .ok_or(SyncError::NotInStore(*address))?;
        let record = self.fetch.read_market(address).await?;

        let mut outcome = ReconcileOutcome {
            address: *address,
            was_resolved: row.status == MarketStatus::Resolved,
            status: row.status,
            winning_option: row.winning_option,
            updated: false,
            ledger_status: record.status,
            note: None,
        };

        match record.status {
            MarketStatus::Resolved => {
                let Some(winner) = record.winning_option else {
                    return Err(SyncError::Malformed {
                        address: *address,
                        source: DecodeError::InconsistentWinner { status: record.status.tag(), winner: None },
                    });
                };

                if row.status == MarketStatus::Resolved {
                    if row.winning_option != Some(winner) {
                        tracing::warn!(
                            market = %address,
                            stored = ?row.winning_option,
                            ledger = winner,
                            "resolved winner differs between store and ledger"
                        );
                        outcome.note = Some(ReconcileNote::WinnerMismatch { ledger: winner });
                    }
                    return Ok(outcome);
                }

                // invalidate first; repeating it is harmless if the write fails
                self.fetch.cache().invalidate(Some(address));
                let rows = self
                    .store
                    .write_market_resolution(address, winner)
                    .await
                    .map_err(|source| SyncError::StoreWrite { address: *address, source })?;
                if rows == 0 {
                    return Err(SyncError::NotInStore(*address));
                }

                tracing::info!(market = %address, winner, question = %record.question, "market resolved on ledger; store updated");
                outcome.was_resolved = true;
                outcome.status = MarketStatus::Resolved;
                outcome.winning_option = Some(winner);
                outcome.updated = true;
            }
            MarketStatus::Active => {
                if row.status == MarketStatus::Resolved {
                    tracing::info!(market = %address, "store resolved but ledger still active; leaving store untouched");
                    outcome.note = Some(ReconcileNote::StillActiveOnLedger);
                }
            }
            MarketStatus::Cancelled => {
                tracing::debug!(market = %address, "cancelled on ledger; not reconciled");
                outcome.note = Some(ReconcileNote::CancelledOnLedger);
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{encode_market, resolved_market, row, sample_market, test_engine_parts, FailingStore};
    use crate::store::MemoryStore;
    use crate::types::MarketSnapshot;

    #[tokio::test]
    async fn ledger_resolution_is_written_once() {
        let market = Address::new([9u8; 32]);
        let (ledger, fetch) = test_engine_parts();
        ledger.set_account(market, encode_market(&resolved_market(&[10, 20], 1)));
        let store = Arc::new(MemoryStore::with_rows([row(market, MarketStatus::Active, None)]));
        let rec = ResolutionReconciler::new(fetch, store.clone());

        let first = rec.reconcile(&market).await.unwrap();
        assert_eq!((first.was_resolved, first.winning_option, first.updated), (true, Some(1), true));
        let stored = store.read_market_row(&market).await.unwrap().unwrap();
        assert_eq!((stored.status, stored.winning_option), (MarketStatus::Resolved, Some(1)));

        let second = rec.reconcile(&market).await.unwrap();
        assert_eq!((second.was_resolved, second.updated), (true, false));
        assert_eq!(second.status, MarketStatus::Resolved);
        assert_eq!(store.resolution_writes(), 1);
    }

    #[tokio::test]
    async fn resolution_invalidates_cached_snapshot() {
        let market = Address::new([9u8; 32]);
        let (ledger, fetch) = test_engine_parts();
        ledger.set_account(market, encode_market(&sample_market(&[10, 20])));
        let _: MarketSnapshot = fetch.get_snapshot(&market).await.unwrap();
        assert_eq!(fetch.cache().stats().total, 1);

        ledger.set_account(market, encode_market(&resolved_market(&[10, 20], 0)));
        let store = Arc::new(MemoryStore::with_rows([row(market, MarketStatus::Active, None)]));
        ResolutionReconciler::new(fetch.clone(), store).reconcile(&market).await.unwrap();

        assert_eq!(fetch.cache().stats().total, 0);
        assert_eq!(fetch.get_snapshot(&market).await.unwrap().status, MarketStatus::Resolved);
    }

    #[tokio::test]
    async fn spurious_active_read_never_reverts_store() {
        let market = Address::new([9u8; 32]);
        let (ledger, fetch) = test_engine_parts();
        ledger.set_account(market, encode_market(&sample_market(&[10, 20])));
        let store = Arc::new(MemoryStore::with_rows([row(market, MarketStatus::Resolved, Some(0))]));

        let out = ResolutionReconciler::new(fetch, store.clone()).reconcile(&market).await.unwrap();
        assert_eq!(out.status, MarketStatus::Resolved);
        assert!(out.was_resolved);
        assert!(!out.updated);
        assert_eq!(out.ledger_status, MarketStatus::Active);
        assert_eq!(out.note, Some(ReconcileNote::StillActiveOnLedger));
        assert_eq!(store.read_market_row(&market).await.unwrap().unwrap().status, MarketStatus::Resolved);
    }

    #[tokio::test]
    async fn active_on_both_sides_is_a_no_op() {
        let market = Address::new([9u8; 32]);
        let (ledger, fetch) = test_engine_parts();
        ledger.set_account(market, encode_market(&sample_market(&[1, 2])));
        let store = Arc::new(MemoryStore::with_rows([row(market, MarketStatus::Active, None)]));
        let out = ResolutionReconciler::new(fetch, store.clone()).reconcile(&market).await.unwrap();
        assert_eq!((out.was_resolved, out.updated, out.note), (false, false, None));
        assert_eq!(store.resolution_writes(), 0);
    }

    #[tokio::test]
    async fn cancelled_is_reported_not_reconciled() {
        let market = Address::new([9u8; 32]);
        let (ledger, fetch) = test_engine_parts();
        let mut cancelled = sample_market(&[1, 2]);
        cancelled.status = MarketStatus::Cancelled;
        ledger.set_account(market, encode_market(&cancelled));
        let store = Arc::new(MemoryStore::with_rows([row(market, MarketStatus::Active, None)]));
        let out = ResolutionReconciler::new(fetch, store).reconcile(&market).await.unwrap();
        assert_eq!(out.status, MarketStatus::Active);
        assert_eq!(out.note, Some(ReconcileNote::CancelledOnLedger));
    }

    #[tokio::test]
    async fn store_write_failure_is_returned_and_cache_stays_invalidated() {
        let market = Address::new([9u8; 32]);
        let (ledger, fetch) = test_engine_parts();
        ledger.set_account(market, encode_market(&resolved_market(&[5, 5], 1)));
        let store = Arc::new(FailingStore::new([row(market, MarketStatus::Active, None)], [market]));

        let err = ResolutionReconciler::new(fetch.clone(), store).reconcile(&market).await.unwrap_err();
        assert!(matches!(err, SyncError::StoreWrite { .. }));
        assert_eq!(fetch.cache().stats().total, 0);
    }

    #[tokio::test]
    async fn unknown_market_is_not_in_store() {
        let market = Address::new([9u8; 32]);
        let (ledger, fetch) = test_engine_parts();
        ledger.set_account(market, encode_market(&resolved_market(&[5, 5], 1)));
        let store = Arc::new(MemoryStore::new());
        let err = ResolutionReconciler::new(fetch, store).reconcile(&market).await.unwrap_err();
        assert!(matches!(err, SyncError::NotInStore(_)));
    }
}
