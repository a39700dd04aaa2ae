use super::reader::ByteReader;
use crate::codec::market::DISCRIMINATOR_LEN;
use crate::error::DecodeError;
use crate::types::Address;

/// Offset of the market reference inside a participation account. The
/// participant aggregator filters on it server-side.
pub const PARTICIPATION_MARKET_OFFSET: usize = DISCRIMINATOR_LEN + Address::LEN;

pub const PARTICIPATION_LEN: usize = DISCRIMINATOR_LEN + 32 + 32 + 8 + 1 + 8 + 1;

/// One wager placed by one owner on one market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipationRecord {
    pub owner: Address,
    pub market: Address,
    pub amount: u64,
    pub option_index: u8,
    pub timestamp: i64,
    pub claimed: bool,
}

pub fn decode_participation(bytes: &[u8]) -> Result<ParticipationRecord, DecodeError> {
    let mut r = ByteReader::new(bytes);
    r.skip(DISCRIMINATOR_LEN, "discriminator")?;
    Ok(ParticipationRecord {
        owner: r.read_address("owner")?,
        market: r.read_address("market")?,
        amount: r.read_u64_le("amount")?,
        option_index: r.read_u8("option_index")?,
        timestamp: r.read_i64_le("timestamp")?,
        claimed: r.read_bool("claimed")?,
    })
}
