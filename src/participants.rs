use std::collections::HashSet;
use std::sync::Arc;

use crate::classify::Classifier;
use crate::codec::PARTICIPATION_MARKET_OFFSET;
use crate::ledger::{AccountFilter, Ledger};
use crate::types::Address;

/// Counts distinct owners of participation accounts pointing at a market.
/// Best-effort telemetry: any listing failure reads as zero.
#[derive(Clone)]
pub struct ParticipantAggregator {
    ledger: Arc<dyn Ledger>,
    program_id: Address,
    classifier: Arc<Classifier>,
}

impl ParticipantAggregator {
    pub fn new(ledger: Arc<dyn Ledger>, program_id: Address, classifier: Arc<Classifier>) -> Self {
        Self { ledger, program_id, classifier }
    }

    pub async fn count_participants(&self, market: &Address) -> u64 {
        let filters = [AccountFilter::Memcmp {
            offset: PARTICIPATION_MARKET_OFFSET,
            bytes: market.as_bytes().to_vec(),
        }];
        let accounts = match self.ledger.get_program_accounts(&self.program_id, &filters).await {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(market = %market, error = %e, "participant listing failed; reporting 0");
                return 0;
            }
        };

        let owners: HashSet<Address> = accounts
            .iter()
            .filter_map(|raw| self.classifier.as_participation(raw))
            .filter(|p| p.market == *market)
            .map(|p| p.owner)
            .collect();

        tracing::debug!(market = %market, accounts = accounts.len(), owners = owners.len(), "participants counted");
        owners.len() as u64
    }
}
