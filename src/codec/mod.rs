//! Fixed-layout decoding of market and participation accounts. No schema
//! registry is available, so offsets are hard-coded against the program's
//! account layout.

pub mod market;
pub mod participation;
pub mod reader;

pub use market::{decode_market, MarketRecord, MARKET_MIN_LEN};
pub use participation::{decode_participation, ParticipationRecord, PARTICIPATION_MARKET_OFFSET};
pub use reader::ByteReader;
