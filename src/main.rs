use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use market_ledger_sync::config::Settings;
use market_ledger_sync::ledger::RpcLedger;
use market_ledger_sync::stats::Stats;
use market_ledger_sync::store::{MarketStore, MemoryStore};
use market_ledger_sync::types::MarketRow;
use market_ledger_sync::SyncEngine;

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

/// Appends one stats line; the summary is best-effort and never stops the loop.
async fn append_stats_line(path: Option<&str>, line: &str) {
    use tokio::io::AsyncWriteExt;

    let Some(path) = path.map(str::trim).filter(|p| !p.is_empty()) else {
        return;
    };
    let res: std::io::Result<()> = async {
        let mut f = tokio::fs::OpenOptions::new().create(true).append(true).open(path).await?;
        f.write_all(format!("{line}\n").as_bytes()).await
    }
    .await;
    if let Err(e) = res {
        tracing::debug!(path, error = %e, "stats line not written");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let s = Settings::from_env()?;
    let cfg = s.engine_config()?;
    let watch = s.watch_addresses()?;

    let ledger = Arc::new(RpcLedger::new(s.rpc_url.clone(), s.rpc_timeout(), s.retry_policy())?);
    let store = Arc::new(MemoryStore::new());
    let stats = Stats::new(now_ms());
    let engine = SyncEngine::new(&cfg, ledger, store.clone(), stats.clone())?;

    tracing::info!(program = %cfg.program_id, rpc = %s.rpc_url, watched = watch.len(), "starting ledger sync");

    // seed the store with whatever the ledger has right now
    let seed = engine.get_snapshot_batch(&watch).await;
    for snap in &seed.snapshots {
        store.upsert(MarketRow::from_snapshot(snap)).await;
    }
    tracing::info!(seeded = store.len().await, failed = seed.errors.len(), "store seeded");
    if store.is_empty().await {
        tracing::warn!("no watched market could be seeded; polls will only report drift");
    }

    match engine.find_missing().await {
        Ok(missing) => {
            for c in &missing {
                tracing::info!(market = %c.address, question = %c.record.question, "ledger market not in store");
            }
        }
        Err(e) => tracing::warn!(error = %e, "drift scan failed"),
    }

    let mut polls: u64 = 0;
    loop {
        polls += 1;

        let rows = store.read_market_rows().await?;
        let mut synced = 0usize;
        for row in &rows {
            match engine.sync_live_volumes(&row.address).await {
                Ok(_) => synced += 1,
                Err(e) => tracing::warn!(market = %row.address, error = %e, retryable = e.is_retryable(), "volume sync failed"),
            }
        }
        tracing::info!(poll = polls, markets = rows.len(), synced, "heartbeat: live volumes synced");

        if s.reconcile_every > 0 && polls % s.reconcile_every == 0 {
            match engine.reconcile_all().await {
                Ok(report) => {
                    for m in &report.resolved_markets {
                        tracing::info!(market = %m.address, winner = m.winning_option, question = %m.question, "resolution picked up");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "reconcile pass failed"),
            }
        }

        // stats summary
        let t = now_ms();
        if stats.should_log(t, s.stats_log_sec) {
            let ss = stats.snapshot(t);
            stats.mark_logged(t);

            let line = serde_json::to_string(&ss).unwrap_or_default();
            let cache = engine.cache_stats();
            tracing::info!(
                up_sec = ss.up_sec,
                ledger_reads = ss.ledger_reads,
                cache_hits = ss.cache_hits,
                cache_misses = ss.cache_misses,
                decode_rejects = ss.decode_rejects,
                reconcile_passes = ss.reconcile_passes,
                newly_resolved = ss.newly_resolved,
                reconcile_errors = ss.reconcile_errors,
                drift_candidates = ss.drift_candidates,
                cache_valid = cache.valid,
                cache_expired = cache.expired,
                "stats"
            );

            append_stats_line(s.stats_jsonl_path.as_deref(), &line).await;
        }

        tokio::time::sleep(std::time::Duration::from_millis(s.poll_ms)).await;
    }
}
