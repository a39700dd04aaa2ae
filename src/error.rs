use thiserror::Error;

use crate::types::Address;

/// Buffer too short or structurally inconsistent. Callers skip the record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("buffer too short reading {field} at offset {offset}: need {need} bytes, have {have}")]
    Truncated {
        field: &'static str,
        offset: usize,
        need: usize,
        have: usize,
    },
    #[error("{field} is not valid utf-8")]
    InvalidUtf8 { field: &'static str },
    #[error("declared question length {0} exceeds field width")]
    QuestionLength(u16),
    #[error("option count {0} outside 2..=4")]
    OptionCount(u8),
    #[error("option {0} is empty")]
    EmptyOption(usize),
    #[error("unknown status tag {0}")]
    UnknownStatus(u8),
    #[error("winning option {winner:?} inconsistent with status {status}")]
    InconsistentWinner { status: u8, winner: Option<u8> },
    #[error("winning option {winner} out of range for {option_count} options")]
    WinnerOutOfRange { winner: u8, option_count: u8 },
    #[error("option pools sum to {sum} but total pool is {total}")]
    PoolMismatch { sum: u128, total: u64 },
}

/// Failures talking to the ledger endpoint.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("unexpected response: {0}")]
    Response(String),
}

impl LedgerError {
    /// Transport and timeout failures are worth another attempt; anything the
    /// endpoint answered deliberately is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Transport(e) => !e.is_status() || e.status().is_some_and(|s| s.is_server_error()),
            LedgerError::Timeout(_) => true,
            LedgerError::Rpc { .. } | LedgerError::Response(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no ledger account at {0}")]
    NotFound(Address),

    #[error("ledger unavailable for {address}: {source}")]
    LedgerUnavailable {
        address: Address,
        #[source]
        source: LedgerError,
    },

    #[error("account {address} is not a well-formed market: {source}")]
    Malformed {
        address: Address,
        #[source]
        source: DecodeError,
    },

    #[error("market {0} has no row in the store")]
    NotInStore(Address),

    #[error("store read failed: {0}")]
    StoreRead(#[source] anyhow::Error),

    #[error("store write failed for {address}: {source}")]
    StoreWrite {
        address: Address,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::LedgerUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
