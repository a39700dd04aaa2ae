//! Fixtures and doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::cache::LiveCache;
use crate::classify::Classifier;
use crate::codec::market::{CATEGORY_LEN, DISCRIMINATOR_LEN, MARKET_ID_LEN, MAX_OPTIONS, OPTION_LEN, QUESTION_LEN};
use crate::codec::{MarketRecord, ParticipationRecord};
use crate::error::LedgerError;
use crate::fetch::{build_snapshot, FetchService};
use crate::ledger::{AccountFilter, Ledger};
use crate::participants::ParticipantAggregator;
use crate::stats::Stats;
use crate::store::{MarketStore, MemoryStore};
use crate::types::{Address, MarketRow, MarketSnapshot, MarketStatus, RawAccount};

pub const PROGRAM: Address = Address::new([200u8; 32]);

fn put_fixed(buf: &mut Vec<u8>, s: &str, len: usize) {
    let mut field = s.as_bytes().to_vec();
    field.resize(len, 0);
    buf.extend_from_slice(&field);
}

/// Writes the on-ledger market layout. Whatever the record says goes in
/// verbatim, so inconsistent records produce inconsistent bytes.
pub fn encode_market(rec: &MarketRecord) -> Vec<u8> {
    let mut buf = vec![0xAB; DISCRIMINATOR_LEN];
    buf.extend_from_slice(rec.authority.as_bytes());
    buf.extend_from_slice(rec.creator.as_bytes());
    buf.push(rec.market_kind);
    put_fixed(&mut buf, &rec.question, QUESTION_LEN);
    buf.extend_from_slice(&rec.question_len.to_le_bytes());
    for i in 0..MAX_OPTIONS {
        put_fixed(&mut buf, rec.options.get(i).map(String::as_str).unwrap_or(""), OPTION_LEN);
    }
    buf.push(rec.options.len() as u8);
    buf.extend_from_slice(&rec.resolution_timestamp.to_le_bytes());
    buf.extend_from_slice(&rec.fee_rate.to_le_bytes());
    buf.extend_from_slice(&rec.min_bet.to_le_bytes());
    buf.extend_from_slice(rec.token_mint.as_bytes());
    buf.push(rec.status.tag());
    match rec.winning_option {
        Some(w) => buf.extend_from_slice(&[1, w]),
        None => buf.push(0),
    }
    for i in 0..MAX_OPTIONS {
        let pool = rec.option_pools.get(i).copied().unwrap_or(0);
        buf.extend_from_slice(&pool.to_le_bytes());
    }
    buf.extend_from_slice(&rec.total_pool.to_le_bytes());
    put_fixed(&mut buf, &rec.market_id, MARKET_ID_LEN);
    put_fixed(&mut buf, &rec.category, CATEGORY_LEN);
    buf
}

/// Active market with one option per pool and a consistent total.
pub fn sample_market(pools: &[u64]) -> MarketRecord {
    let question = "Will it happen?".to_string();
    MarketRecord {
        authority: Address::new([11u8; 32]),
        creator: Address::new([12u8; 32]),
        market_kind: 0,
        question_len: question.len() as u16,
        question,
        options: (1..=pools.len()).map(|i| format!("Option {i}")).collect(),
        resolution_timestamp: 1_767_225_600,
        fee_rate: 100,
        min_bet: 1_000_000,
        token_mint: Address::new([13u8; 32]),
        status: MarketStatus::Active,
        winning_option: None,
        option_pools: pools.to_vec(),
        total_pool: pools.iter().sum(),
        market_id: "m-0001".into(),
        category: "general".into(),
    }
}

pub fn resolved_market(pools: &[u64], winner: u8) -> MarketRecord {
    MarketRecord {
        status: MarketStatus::Resolved,
        winning_option: Some(winner),
        ..sample_market(pools)
    }
}

pub fn encode_participation(rec: &ParticipationRecord) -> Vec<u8> {
    let mut buf = vec![0xCD; DISCRIMINATOR_LEN];
    buf.extend_from_slice(rec.owner.as_bytes());
    buf.extend_from_slice(rec.market.as_bytes());
    buf.extend_from_slice(&rec.amount.to_le_bytes());
    buf.push(rec.option_index);
    buf.extend_from_slice(&rec.timestamp.to_le_bytes());
    buf.push(rec.claimed as u8);
    buf
}

pub fn participation(owner: [u8; 32], market: [u8; 32], amount: u64, option_index: u8) -> ParticipationRecord {
    ParticipationRecord {
        owner: Address::new(owner),
        market: Address::new(market),
        amount,
        option_index,
        timestamp: 1_750_000_000,
        claimed: false,
    }
}

pub fn snapshot(address: Address) -> MarketSnapshot {
    build_snapshot(address, &sample_market(&[1_000_000, 3_000_000]), 6, 2, Utc::now())
}

pub fn row(address: Address, status: MarketStatus, winning_option: Option<u8>) -> MarketRow {
    MarketRow {
        address,
        question: "Will it happen?".into(),
        options: vec!["Option 1".into(), "Option 2".into()],
        status,
        winning_option,
        option_volumes: vec![Decimal::ZERO, Decimal::ZERO],
        total_volume: Decimal::ZERO,
        participant_count: 0,
    }
}

#[derive(Default)]
struct MockState {
    accounts: HashMap<Address, Vec<u8>>,
    program_accounts: HashMap<Address, Vec<RawAccount>>,
    failing_reads: HashSet<Address>,
    hanging_reads: HashSet<Address>,
    fail_listings: bool,
    account_reads: usize,
}

/// Scripted ledger. Filters are applied the way the RPC node would.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_account(&self, address: Address, bytes: Vec<u8>) {
        self.state.lock().unwrap().accounts.insert(address, bytes);
    }

    pub fn add_program_account(&self, program: Address, address: Address, bytes: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .program_accounts
            .entry(program)
            .or_default()
            .push(RawAccount { address, bytes });
    }

    pub fn fail_listings(&self, fail: bool) {
        self.state.lock().unwrap().fail_listings = fail;
    }

    pub fn fail_reads_for(&self, address: Address) {
        self.state.lock().unwrap().failing_reads.insert(address);
    }

    pub fn hang_reads_for(&self, address: Address) {
        self.state.lock().unwrap().hanging_reads.insert(address);
    }

    pub fn account_reads(&self) -> usize {
        self.state.lock().unwrap().account_reads
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn get_account_info(&self, address: &Address) -> Result<Option<Vec<u8>>, LedgerError> {
        let (hang, result) = {
            let mut st = self.state.lock().unwrap();
            st.account_reads += 1;
            let result = if st.failing_reads.contains(address) {
                Err(LedgerError::Rpc { code: -32005, message: "node is behind".into() })
            } else {
                Ok(st.accounts.get(address).cloned())
            };
            (st.hanging_reads.contains(address), result)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        result
    }

    async fn get_program_accounts(
        &self,
        program: &Address,
        filters: &[AccountFilter],
    ) -> Result<Vec<RawAccount>, LedgerError> {
        let st = self.state.lock().unwrap();
        if st.fail_listings {
            return Err(LedgerError::Response("listing refused".into()));
        }
        Ok(st
            .program_accounts
            .get(program)
            .map(|accounts| {
                accounts
                    .iter()
                    .filter(|a| filters.iter().all(|f| f.matches(&a.bytes)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Memory store whose writes fail for chosen addresses.
pub struct FailingStore {
    inner: MemoryStore,
    fail_writes: HashSet<Address>,
}

impl FailingStore {
    pub fn new(rows: impl IntoIterator<Item = MarketRow>, fail_writes: impl IntoIterator<Item = Address>) -> Self {
        Self { inner: MemoryStore::with_rows(rows), fail_writes: fail_writes.into_iter().collect() }
    }
}

#[async_trait]
impl MarketStore for FailingStore {
    async fn read_market_rows(&self) -> anyhow::Result<Vec<MarketRow>> {
        self.inner.read_market_rows().await
    }

    async fn read_market_row(&self, address: &Address) -> anyhow::Result<Option<MarketRow>> {
        self.inner.read_market_row(address).await
    }

    async fn write_market_resolution(&self, address: &Address, winning_option: u8) -> anyhow::Result<u64> {
        if self.fail_writes.contains(address) {
            anyhow::bail!("write rejected for {address}");
        }
        self.inner.write_market_resolution(address, winning_option).await
    }

    async fn write_live_volumes(
        &self,
        address: &Address,
        option_pools: &[Decimal],
        total_volume: Decimal,
        participant_count: u64,
    ) -> anyhow::Result<u64> {
        if self.fail_writes.contains(address) {
            anyhow::bail!("write rejected for {address}");
        }
        self.inner.write_live_volumes(address, option_pools, total_volume, participant_count).await
    }
}

/// A mock ledger and a fetch service reading from it.
pub fn test_engine_parts() -> (Arc<MockLedger>, Arc<FetchService>) {
    let ledger = Arc::new(MockLedger::new());
    let participants = ParticipantAggregator::new(ledger.clone(), PROGRAM, Arc::new(Classifier::default()));
    let fetch = FetchService::new(
        ledger.clone(),
        Arc::new(LiveCache::default()),
        participants,
        6,
        Duration::from_secs(1),
        4,
        Stats::new(0),
    );
    (ledger, Arc::new(fetch))
}
