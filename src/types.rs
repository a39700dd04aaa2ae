use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 32-byte ledger address, rendered as base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 32]);

impl Address {
    pub const LEN: usize = 32;

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("invalid base58: {0}")]
    Base58(String),
    #[error("expected 32 bytes, got {0}")]
    Length(usize),
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| AddressParseError::Base58(e.to_string()))?;
        Self::from_slice(&bytes).ok_or(AddressParseError::Length(bytes.len()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketStatus {
    Active,
    Resolved,
    Cancelled,
}

impl MarketStatus {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Active),
            1 => Some(Self::Resolved),
            2 => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Resolved => 1,
            Self::Cancelled => 2,
        }
    }
}

/// Where a snapshot came from. Never persisted as ledger truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    LiveLedger,
    Cache,
    PersistedFallback,
}

/// Raw account bytes as returned by the ledger. Dropped once decoded.
#[derive(Debug, Clone)]
pub struct RawAccount {
    pub address: Address,
    pub bytes: Vec<u8>,
}

/// Point-in-time reconstruction of one market, amounts in display units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub address: Address,
    pub question: String,
    pub options: Vec<String>,
    pub status: MarketStatus,
    pub winning_option: Option<u8>,
    pub option_pools: Vec<Decimal>,
    pub total_pool: Decimal,
    pub option_percentages: Vec<Decimal>,
    pub participant_count: u64,
    pub last_updated: DateTime<Utc>,
    pub data_source: DataSource,
}

/// The coarser row the secondary store keeps per market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRow {
    pub address: Address,
    pub question: String,
    pub options: Vec<String>,
    pub status: MarketStatus,
    pub winning_option: Option<u8>,
    pub option_volumes: Vec<Decimal>,
    pub total_volume: Decimal,
    pub participant_count: u64,
}

impl MarketRow {
    pub fn from_snapshot(snap: &MarketSnapshot) -> Self {
        Self {
            address: snap.address,
            question: snap.question.clone(),
            options: snap.options.clone(),
            status: snap.status,
            winning_option: snap.winning_option,
            option_volumes: snap.option_pools.clone(),
            total_volume: snap.total_pool,
            participant_count: snap.participant_count,
        }
    }
}
