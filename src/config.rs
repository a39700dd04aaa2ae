use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::classify::{ClassifierConfig, SizeBand};
use crate::ledger::RetryPolicy;
use crate::reconcile::BatchConfig;
use crate::types::Address;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub rpc_url: String,
    pub program_id: String,
    pub token_decimals: u32,

    pub rpc_timeout_ms: u64,
    pub rpc_max_attempts: usize,
    pub rpc_retry_base_ms: u64,

    pub cache_ttl_sec: u64,
    pub snapshot_concurrency: usize,

    pub reconcile_window_size: usize,
    pub reconcile_window_delay_ms: u64,
    pub max_error_details: usize,

    // Classifier thresholds; empirical, revalidate per deployment
    pub participation_min_len: usize,
    pub participation_max_len: usize,
    pub market_min_len: usize,
    pub market_max_len: usize,
    pub max_participation_ui: u64,
    /// Exact market allocation size, when the deployment uses one.
    pub market_account_size: Option<u64>,

    // Watcher
    pub poll_ms: u64,
    pub reconcile_every: u64,
    pub watch_markets: String,

    // Stats
    pub stats_log_sec: u64,
    pub stats_jsonl_path: Option<String>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let c = config::Config::builder()
            .set_default("rpc_url", "https://api.devnet.solana.com")?
            .set_default("token_decimals", 6_i64)?
            .set_default("rpc_timeout_ms", 10_000_i64)?
            .set_default("rpc_max_attempts", 2_i64)?
            .set_default("rpc_retry_base_ms", 250_i64)?
            .set_default("cache_ttl_sec", 30_i64)?
            .set_default("snapshot_concurrency", 8_i64)?
            .set_default("reconcile_window_size", 5_i64)?
            .set_default("reconcile_window_delay_ms", 1_000_i64)?
            .set_default("max_error_details", 10_i64)?
            .set_default("participation_min_len", 80_i64)?
            .set_default("participation_max_len", 128_i64)?
            .set_default("market_min_len", 626_i64)?
            .set_default("market_max_len", 2_048_i64)?
            .set_default("max_participation_ui", 1_000_000_i64)?
            .set_default("poll_ms", 15_000_i64)?
            .set_default("reconcile_every", 4_i64)?
            .set_default("watch_markets", "")?
            .set_default("stats_log_sec", 60_i64)?
            .add_source(config::Environment::default())
            .build()?;
        let s: Settings = c.try_deserialize()?;
        s.validate()?;
        Ok(s)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.token_decimals <= 18, "token_decimals {} > 18", self.token_decimals);
        anyhow::ensure!(
            self.participation_min_len <= self.participation_max_len,
            "participation size band is empty"
        );
        anyhow::ensure!(self.market_min_len <= self.market_max_len, "market size band is empty");
        Ok(())
    }

    pub fn program_address(&self) -> anyhow::Result<Address> {
        self.program_id
            .parse::<Address>()
            .with_context(|| format!("bad program_id {}", self.program_id))
    }

    pub fn watch_addresses(&self) -> anyhow::Result<Vec<Address>> {
        self.watch_markets
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<Address>().with_context(|| format!("bad watch market {s}")))
            .collect()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let base = Duration::from_millis(self.rpc_retry_base_ms);
        RetryPolicy::new(self.rpc_max_attempts, base, base.saturating_mul(8))
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let scale = 10u64.checked_pow(self.token_decimals);
        Ok(EngineConfig {
            program_id: self.program_address()?,
            token_decimals: self.token_decimals,
            cache_ttl: Duration::from_secs(self.cache_ttl_sec),
            // outer bound on top of the client's own timeout and retries
            read_timeout: self.rpc_timeout().saturating_mul(self.rpc_max_attempts.max(1) as u32 + 1),
            snapshot_concurrency: self.snapshot_concurrency,
            market_account_size: self.market_account_size,
            batch: BatchConfig {
                window_size: self.reconcile_window_size,
                window_delay: Duration::from_millis(self.reconcile_window_delay_ms),
                max_error_details: self.max_error_details,
            },
            classifier: ClassifierConfig {
                participation: SizeBand::new(self.participation_min_len, self.participation_max_len),
                market: SizeBand::new(self.market_min_len, self.market_max_len),
                max_participation_amount: scale
                    .and_then(|s| self.max_participation_ui.checked_mul(s))
                    .unwrap_or(u64::MAX),
            },
        })
    }
}

/// Everything the engine needs, independent of where it was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub program_id: Address,
    pub token_decimals: u32,
    pub cache_ttl: Duration,
    pub read_timeout: Duration,
    pub snapshot_concurrency: usize,
    pub market_account_size: Option<u64>,
    pub batch: BatchConfig,
    pub classifier: ClassifierConfig,
}

impl EngineConfig {
    pub fn new(program_id: Address) -> Self {
        Self {
            program_id,
            token_decimals: 6,
            cache_ttl: crate::cache::DEFAULT_TTL,
            read_timeout: Duration::from_secs(10),
            snapshot_concurrency: 8,
            market_account_size: None,
            batch: BatchConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}
