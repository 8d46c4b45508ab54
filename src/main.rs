// =============================================================================
// Meridian Feed — Main Entry Point
// =============================================================================
//
// Wires the acquisition pipeline together: configuration, exchange clients,
// source router, coordinator, and sinks.  The coordinator emits one
// AggregateSnapshot per sampling interval until the process is stopped.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod config;
mod coordinator;
mod exchange;
mod indicators;
mod router;
mod series;
mod sinks;
mod snapshot;
mod types;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::PipelineConfig;
use crate::coordinator::MarketCoordinator;
use crate::exchange::{BinanceClient, BybitClient, DominanceClient, ExchangeClient};
use crate::router::SourceRouter;
use crate::sinks::{DashboardFeed, JsonlPersistence, SnapshotCache, SnapshotSink};
use crate::types::{AnomalyLog, ExchangeId};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║          Meridian Feed — Starting Up                    ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = PipelineConfig::load("pipeline_config.json").unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        PipelineConfig::default()
    });

    // Override tracked coins from env if available.
    if let Ok(symbols) = std::env::var("MERIDIAN_COINS") {
        let overridden: Vec<_> = symbols
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .map(|symbol| config::CoinConfig {
                symbol,
                index: false,
                sources: vec![ExchangeId::Binance, ExchangeId::Bybit],
            })
            .collect();
        if !overridden.is_empty() {
            config.coins = overridden;
        }
    }
    config.validate()?;

    info!(
        coins = ?config.coins.iter().map(|c| c.symbol.as_str()).collect::<Vec<_>>(),
        interval = %config.interval,
        lookback = config.lookback_len,
        published = config.published_len,
        "Pipeline configured"
    );

    // ── 2. Exchange clients & router ─────────────────────────────────────
    let mut registry: HashMap<ExchangeId, Arc<dyn ExchangeClient>> = HashMap::new();
    registry.insert(ExchangeId::Binance, Arc::new(BinanceClient::new()));
    registry.insert(ExchangeId::Bybit, Arc::new(BybitClient::new()));
    registry.insert(ExchangeId::GlobalIndex, Arc::new(DominanceClient::new()));

    let mut router = SourceRouter::new(config.backoff);
    for coin in &config.coins {
        let sources: Vec<Arc<dyn ExchangeClient>> = coin
            .sources
            .iter()
            .filter_map(|id| registry.get(id).cloned())
            .collect();
        router.add_route(coin.symbol.clone(), sources);
    }
    let router = Arc::new(router);

    // ── 3. Sinks ─────────────────────────────────────────────────────────
    let cache = Arc::new(SnapshotCache::new());
    let persistence = Arc::new(JsonlPersistence::new(&config.persistence_path));
    let dashboard = Arc::new(DashboardFeed::new(32));

    let sinks: Vec<Arc<dyn SnapshotSink>> =
        vec![cache.clone(), persistence.clone(), dashboard.clone()];

    info!(
        persistence_path = %config.persistence_path,
        sinks = sinks.len(),
        "Sinks registered"
    );

    // Trace the push feed the way an attached dashboard would consume it.
    let mut feed_rx = dashboard.subscribe();
    tokio::spawn(async move {
        while let Ok(aggregate) = feed_rx.recv().await {
            tracing::debug!(
                cycle_seq = aggregate.cycle_seq,
                coins = aggregate.coins.len(),
                "dashboard feed push"
            );
        }
    });

    // ── 4. Coordinator ───────────────────────────────────────────────────
    let anomalies = Arc::new(AnomalyLog::new());
    let coordinator = Arc::new(MarketCoordinator::new(
        config,
        router,
        sinks,
        anomalies.clone(),
    ));

    tokio::spawn(coordinator.run());

    info!("Pipeline running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping");

    let anomaly_count = anomalies.recent().len();
    if anomaly_count > 0 {
        info!(recent_anomalies = anomaly_count, "Anomalies recorded this run");
    }
    info!(
        last_cached_cycle = ?cache.latest().map(|s| s.cycle_seq),
        cache_version = cache.version(),
        "Meridian Feed shut down complete."
    );

    Ok(())
}
