use serde::Serialize;

use super::reader::ByteReader;
use crate::error::DecodeError;
use crate::types::{Address, MarketStatus};

pub const DISCRIMINATOR_LEN: usize = 8;
pub const QUESTION_LEN: usize = 200;
pub const OPTION_LEN: usize = 50;
pub const MAX_OPTIONS: usize = 4;
pub const MIN_OPTIONS: usize = 2;
pub const MARKET_ID_LEN: usize = 32;
pub const CATEGORY_LEN: usize = 20;

/// Smallest buffer that can hold a market with no winner recorded.
pub const MARKET_MIN_LEN: usize = DISCRIMINATOR_LEN
    + 32 * 2 // authority, creator
    + 1 // market kind
    + QUESTION_LEN
    + 2 // declared question length
    + OPTION_LEN * MAX_OPTIONS
    + 1 // option count
    + 8 * 3 // resolution timestamp, fee rate, min bet
    + 32 // token mint
    + 1 // status
    + 1 // winner tag
    + 8 * MAX_OPTIONS
    + 8 // total pool
    + MARKET_ID_LEN
    + CATEGORY_LEN;

/// Decoded market account, raw integer amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    pub authority: Address,
    pub creator: Address,
    pub market_kind: u8,
    pub question: String,
    pub question_len: u16,
    pub options: Vec<String>,
    pub resolution_timestamp: i64,
    pub fee_rate: u64,
    pub min_bet: u64,
    pub token_mint: Address,
    pub status: MarketStatus,
    pub winning_option: Option<u8>,
    pub option_pools: Vec<u64>,
    pub total_pool: u64,
    pub market_id: String,
    pub category: String,
}

pub fn decode_market(bytes: &[u8]) -> Result<MarketRecord, DecodeError> {
    let mut r = ByteReader::new(bytes);
    r.skip(DISCRIMINATOR_LEN, "discriminator")?;

    let authority = r.read_address("authority")?;
    let creator = r.read_address("creator")?;
    let market_kind = r.read_u8("market_kind")?;
    let question = r.read_fixed_string(QUESTION_LEN, "question")?;
    let question_len = r.read_u16_le("question_len")?;

    let mut padded_options = Vec::with_capacity(MAX_OPTIONS);
    for _ in 0..MAX_OPTIONS {
        padded_options.push(r.read_fixed_string(OPTION_LEN, "option")?);
    }
    let option_count = r.read_u8("option_count")?;

    let resolution_timestamp = r.read_i64_le("resolution_timestamp")?;
    let fee_rate = r.read_u64_le("fee_rate")?;
    let min_bet = r.read_u64_le("min_bet")?;
    let token_mint = r.read_address("token_mint")?;
    let status_tag = r.read_u8("status")?;
    let winning_option = r.read_optional_u8("winning_option")?;

    let mut pools = [0u64; MAX_OPTIONS];
    for p in pools.iter_mut() {
        *p = r.read_u64_le("option_pool")?;
    }
    let total_pool = r.read_u64_le("total_pool")?;
    let market_id = r.read_fixed_string(MARKET_ID_LEN, "market_id")?;
    let category = r.read_fixed_string(CATEGORY_LEN, "category")?;

    // structure is all read; now the cross-field checks
    if question_len as usize > QUESTION_LEN {
        return Err(DecodeError::QuestionLength(question_len));
    }
    let count = option_count as usize;
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&count) {
        return Err(DecodeError::OptionCount(option_count));
    }
    if let Some(i) = padded_options[..count].iter().position(|o| o.is_empty()) {
        return Err(DecodeError::EmptyOption(i));
    }

    let status = MarketStatus::from_tag(status_tag).ok_or(DecodeError::UnknownStatus(status_tag))?;
    if winning_option.is_some() != (status == MarketStatus::Resolved) {
        return Err(DecodeError::InconsistentWinner { status: status_tag, winner: winning_option });
    }
    if let Some(w) = winning_option {
        if w >= option_count {
            return Err(DecodeError::WinnerOutOfRange { winner: w, option_count });
        }
    }

    let sum: u128 = pools.iter().map(|p| *p as u128).sum();
    let unused_funded = pools[count..].iter().any(|p| *p != 0);
    if unused_funded || sum != total_pool as u128 {
        return Err(DecodeError::PoolMismatch { sum, total: total_pool });
    }

    padded_options.truncate(count);
    Ok(MarketRecord {
        authority,
        creator,
        market_kind,
        question,
        question_len,
        options: padded_options,
        resolution_timestamp,
        fee_rate,
        min_bet,
        token_mint,
        status,
        winning_option,
        option_pools: pools[..count].to_vec(),
        total_pool,
        market_id,
        category,
    })
}
