pub mod memory;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{Address, MarketRow};

pub use memory::MemoryStore;

/// The secondary store this engine reconciles into. Implementations own their
/// own row-level write serialization.
#[async_trait]
pub trait MarketStore: Send + Sync {
    async fn read_market_rows(&self) -> anyhow::Result<Vec<MarketRow>>;

    async fn read_market_row(&self, address: &Address) -> anyhow::Result<Option<MarketRow>>;

    /// Marks the market resolved. Returns rows affected.
    async fn write_market_resolution(&self, address: &Address, winning_option: u8) -> anyhow::Result<u64>;

    /// Returns rows affected.
    async fn write_live_volumes(
        &self,
        address: &Address,
        option_pools: &[Decimal],
        total_volume: Decimal,
        participant_count: u64,
    ) -> anyhow::Result<u64>;
}
