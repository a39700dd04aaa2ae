pub mod retry;
pub mod rpc;

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::types::{Address, RawAccount};

pub use retry::RetryPolicy;
pub use rpc::RpcLedger;

/// Server-side filters for program account listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    /// Exact account length in bytes.
    DataSize(u64),
    /// Bytes at `offset` equal `bytes`.
    Memcmp { offset: usize, bytes: Vec<u8> },
}

impl AccountFilter {
    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            AccountFilter::DataSize(n) => data.len() as u64 == *n,
            AccountFilter::Memcmp { offset, bytes } => data
                .get(*offset..offset.saturating_add(bytes.len()))
                .is_some_and(|s| s == bytes.as_slice()),
        }
    }
}

/// Read-only view of the ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// `None` when no account exists at `address`.
    async fn get_account_info(&self, address: &Address) -> Result<Option<Vec<u8>>, LedgerError>;

    /// All accounts owned by `program` matching every filter.
    async fn get_program_accounts(
        &self,
        program: &Address,
        filters: &[AccountFilter],
    ) -> Result<Vec<RawAccount>, LedgerError>;
}
