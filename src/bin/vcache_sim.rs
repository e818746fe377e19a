//! Vertical cache simulator
//!
//! Drives a [`VerticalCache`] with synthetic round-robin archives and flushes
//! it into in-memory storage, printing Prometheus metrics at the end.
//!
//! # Configuration
//!
//! Cache settings are read from:
//! 1. `VCACHE_CONFIG` environment variable (path to TOML file)
//! 2. `./vcache.toml` in current directory
//! 3. Default configuration
//!
//! # Example
//!
//! ```bash
//! RUST_LOG=gorilla_vcache=debug ./vcache-sim
//! ```

use std::sync::Arc;
use std::time::Duration;

use gorilla_vcache::{
    observability::{PrometheusConfig, PrometheusExporter},
    rrd::slot_index,
    ArchiveSnapshot, FlushStats, MemoryFlusher, RoundRobinArchive, VerticalCache,
    VerticalCacheConfig,
};
use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

const BUNDLES: i64 = 8;
const SERIES_PER_BUNDLE: i64 = 16;
const ARCHIVE_SIZE: i64 = 60;
const STEP: Duration = Duration::from_secs(60);
const ROUNDS: i64 = 120;
const INGEST_TICK: Duration = Duration::from_millis(25);

/// Synthetic series archives, one per (bundle, index)
fn build_archives() -> Vec<ArchiveSnapshot> {
    (0..BUNDLES)
        .flat_map(|bundle| {
            (0..SERIES_PER_BUNDLE)
                .map(move |idx| ArchiveSnapshot::new(bundle, 0, idx, STEP, ARCHIVE_SIZE))
        })
        .collect()
}

/// Advance every archive by one step and merge it into the cache
fn ingest_round(
    round: i64,
    start_ms: i64,
    archives: &mut [ArchiveSnapshot],
    cache: &mut VerticalCache,
    storage: &MemoryFlusher,
) -> gorilla_vcache::Result<()> {
    let ts = start_ms + round * STEP.as_millis() as i64;
    for rra in archives.iter_mut() {
        let value = ((round + rra.idx) as f64 / 10.0).sin() * 100.0 + rra.bundle_id as f64;
        rra.latest = ts;
        rra.set_point(slot_index(ts, STEP, ARCHIVE_SIZE), value);

        let persisted = storage.latest(rra.bundle_key(), rra.idx).unwrap_or(0);
        cache.update(&*rra, persisted)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gorilla_vcache=info".parse()?)
                .add_directive("vcache_sim=info".parse()?),
        )
        .init();

    let config = VerticalCacheConfig::load();
    info!(
        max_concurrent_flushes = config.max_concurrent_flushes,
        flush_interval_secs = config.flush_interval_secs,
        "Starting vertical cache simulation"
    );

    let storage = Arc::new(MemoryFlusher::new());
    let stats = Arc::new(FlushStats::new());
    let mut flush_tick = interval(config.flush_interval());
    flush_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    flush_tick.tick().await;

    let mut cache = VerticalCache::new(config);
    let mut archives = build_archives();
    let mut ingest_tick = interval(INGEST_TICK);
    let start_ms = 1_700_000_000_000;
    let mut round = 0;

    while round < ROUNDS {
        tokio::select! {
            _ = signal::ctrl_c() => {
                warn!(round, "Interrupted, flushing what is cached");
                break;
            }
            _ = flush_tick.tick() => {
                cache.flush(storage.clone(), &stats).await;
            }
            _ = ingest_tick.tick() => {
                ingest_round(round, start_ms, &mut archives, &mut cache, &storage)?;
                round += 1;
            }
        }
    }

    let report = cache.flush(storage.clone(), &stats).await;
    info!(
        segments = report.segments,
        points = report.counts.points,
        "Final flush complete"
    );

    let totals = stats.snapshot();
    info!(
        rounds = round,
        passes = totals.passes,
        points = totals.points,
        ops = totals.ops,
        rows_stored = storage.row_count(),
        rejected = storage.rejected_writes(),
        "Simulation finished"
    );

    let exporter = PrometheusExporter::new(PrometheusConfig::default(), stats);
    println!("{}", exporter.export(cache.len()));
    Ok(())
}
