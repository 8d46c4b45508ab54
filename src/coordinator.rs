// =============================================================================
// MarketCoordinator — the per-cycle scheduler
// =============================================================================
//
// One timer drives one cycle per sampling interval.  A cycle fans out one
// task per coin (coins share no mutable state), joins them behind a hard
// timeout, assembles an AggregateSnapshot, and hands it to every sink.
//
// Failure posture: an aggregate is emitted EVERY cycle.  A coin whose
// sources are all down, or whose task is still running at the timeout, is
// represented by a stale carry-forward built from its series store; a single
// dead metric only flags itself.  Nothing below this module raises to a
// caller.
//
// Ordering: within one coin, fetch -> append -> compute -> assembly is the
// sequential body of its task.  Across coins nothing is ordered; the join
// barrier is the only synchronisation point.  A timed-out task is aborted at
// an await point, so a fetch that never completed its append leaves the
// store untouched.
// =============================================================================

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::{CoinConfig, IndicatorPeriods, PipelineConfig};
use crate::indicators;
use crate::router::SourceRouter;
use crate::series::{ScalarKind, SeriesStore};
use crate::sinks::SnapshotSink;
use crate::snapshot::{AggregateSnapshot, MarketSnapshot, MetricReading};
use crate::types::{AnomalyKind, AnomalyLog, Candle, ExchangeId, MetricKind};

/// Cycle state machine.  `Fetching` covers the fan-out (each coin task runs
/// fetch, append, and indicator computation sequentially inside it);
/// `Computing` covers the stale carry-forward work for coins that produced
/// nothing before the barrier released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Computing,
    Assembling,
    Emitted,
}

/// Per-coin freshness flags used while assembling a snapshot.
struct Freshness {
    coin_stale: bool,
    oi_stale: bool,
    funding_stale: bool,
    source: Option<ExchangeId>,
    latency_ms: Option<u64>,
}

impl Freshness {
    fn carried_forward() -> Self {
        Self {
            coin_stale: true,
            oi_stale: true,
            funding_stale: true,
            source: None,
            latency_ms: None,
        }
    }
}

pub struct MarketCoordinator {
    config: PipelineConfig,
    router: Arc<SourceRouter>,
    stores: HashMap<String, Arc<Mutex<SeriesStore>>>,
    sinks: Vec<Arc<dyn SnapshotSink>>,
    anomalies: Arc<AnomalyLog>,
    cycle_seq: AtomicU64,
    state: Mutex<CycleState>,
}

impl MarketCoordinator {
    pub fn new(
        config: PipelineConfig,
        router: Arc<SourceRouter>,
        sinks: Vec<Arc<dyn SnapshotSink>>,
        anomalies: Arc<AnomalyLog>,
    ) -> Self {
        let stores = config
            .coins
            .iter()
            .map(|coin| {
                let store = SeriesStore::new(
                    coin.symbol.clone(),
                    config.interval,
                    config.lookback_len,
                    config.published_len,
                    Arc::clone(&anomalies),
                );
                (coin.symbol.clone(), Arc::new(Mutex::new(store)))
            })
            .collect();

        Self {
            config,
            router,
            stores,
            sinks,
            anomalies,
            cycle_seq: AtomicU64::new(0),
            state: Mutex::new(CycleState::Idle),
        }
    }

    pub fn state(&self) -> CycleState {
        *self.state.lock()
    }

    fn set_state(&self, next: CycleState) {
        let mut state = self.state.lock();
        debug!(from = ?*state, to = ?next, "cycle state transition");
        *state = next;
    }

    /// Drive cycles forever at the sampling cadence.  A cycle that overruns
    /// its slot delays the next tick rather than stacking a second cycle on
    /// top of it.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.interval.as_secs()));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_s = self.config.interval.as_secs(),
            coins = self.config.coins.len(),
            "market coordinator running"
        );

        loop {
            ticker.tick().await;
            let aggregate = self.run_cycle().await;
            debug!(
                cycle_seq = aggregate.cycle_seq,
                state = ?self.state(),
                "cycle finished, waiting for next tick"
            );
        }
    }

    /// Execute one full cycle and return the emitted aggregate.
    pub async fn run_cycle(&self) -> AggregateSnapshot {
        let seq = self.cycle_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let cycle_ts = chrono::Utc::now().timestamp_millis();

        // ── Fetching: fan out one task per coin ─────────────────────────
        self.set_state(CycleState::Fetching);

        let mut tasks: JoinSet<(String, Option<MarketSnapshot>)> = JoinSet::new();
        for coin in &self.config.coins {
            let store = Arc::clone(&self.stores[&coin.symbol]);
            tasks.spawn(fetch_and_compute(
                coin.clone(),
                self.config.clone(),
                Arc::clone(&self.router),
                store,
                Arc::clone(&self.anomalies),
            ));
        }

        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.cycle_timeout_secs);
        let mut results: HashMap<String, MarketSnapshot> = HashMap::new();

        while !tasks.is_empty() {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((symbol, Some(snapshot))))) => {
                    results.insert(symbol, snapshot);
                }
                Ok(Some(Ok((_symbol, None)))) => {
                    // Sources exhausted; the carry-forward pass covers it.
                }
                Ok(Some(Err(join_err))) => {
                    error!(error = %join_err, "coin task panicked");
                }
                Ok(None) => break,
                Err(_) => {
                    let outstanding = tasks.len();
                    warn!(
                        seq,
                        outstanding,
                        timeout_s = self.config.cycle_timeout_secs,
                        "cycle timeout — abandoning outstanding coin tasks"
                    );
                    self.anomalies.push(
                        AnomalyKind::CycleTimeout,
                        "*",
                        format!("cycle {seq}: {outstanding} coin task(s) abandoned"),
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        // ── Computing: stale carry-forwards for everything missing ──────
        self.set_state(CycleState::Computing);
        for coin in &self.config.coins {
            if results.contains_key(&coin.symbol) {
                continue;
            }
            let store = self.stores[&coin.symbol].lock();
            let snapshot = build_snapshot(
                &store,
                coin,
                &self.config.periods,
                Freshness::carried_forward(),
            );
            results.insert(coin.symbol.clone(), snapshot);
        }

        // ── Assembling: one aggregate for the logical cycle ─────────────
        self.set_state(CycleState::Assembling);
        let coins: BTreeMap<String, MarketSnapshot> = results.into_iter().collect();
        let aggregate = AggregateSnapshot::new(seq, cycle_ts, coins);

        // ── Emitted: hand to every sink; failures only get logged ───────
        self.set_state(CycleState::Emitted);
        for sink in &self.sinks {
            if let Err(err) = sink.publish(&aggregate).await {
                warn!(sink = sink.name(), error = %err, "sink publish failed");
            }
        }

        info!(
            seq,
            coins = aggregate.coins.len(),
            fresh = aggregate.fresh_count(),
            "cycle emitted"
        );

        self.set_state(CycleState::Idle);
        aggregate
    }
}

/// The body of one coin's cycle task: fetch candles, repair gaps, append,
/// fetch scalars, then compute indicators and build the snapshot.
///
/// Returns `None` when the candle fetch exhausted every source — the
/// coordinator then carries the coin forward from its store.
async fn fetch_and_compute(
    coin: CoinConfig,
    config: PipelineConfig,
    router: Arc<SourceRouter>,
    store: Arc<Mutex<SeriesStore>>,
    anomalies: Arc<AnomalyLog>,
) -> (String, Option<MarketSnapshot>) {
    let symbol = coin.symbol.clone();
    let pair = coin.pair();
    let started = std::time::Instant::now();

    let since = store.lock().last_candle_ts();
    let page = router
        .fetch_candles(
            &symbol,
            &pair,
            config.interval,
            since,
            config.lookback_len as u32,
        )
        .await;

    let (source, candles) = match page {
        Ok(ok) => ok,
        Err(err) => {
            warn!(symbol = %symbol, error = %err, "candle fetch failed on every source, carrying forward");
            anomalies.push(
                AnomalyKind::SourcesExhausted,
                &symbol,
                format!("candles: {err}"),
            );
            return (symbol, None);
        }
    };

    // Only closed candles enter the store: the newest page entry may still
    // be in progress, with a close time in the future.
    let now_ms = chrono::Utc::now().timestamp_millis();
    let candles: Vec<Candle> = candles.into_iter().filter(|c| c.ts <= now_ms).collect();

    // Everything before the newest candle is history; the newest is this
    // cycle's live value.  If a gap remains in front of the live value after
    // the page is applied, issue exactly one bounded backfill through the
    // router before accepting it.
    let gap = {
        let mut s = store.lock();
        match candles.split_last() {
            Some((live, earlier)) => {
                s.backfill(earlier);
                s.probe_gap(live.ts)
            }
            None => None,
        }
    };

    if let Some(gap) = gap {
        debug!(symbol = %symbol, missing = gap.missing, "gap detected, requesting bounded backfill");
        match router
            .fetch_candles(&symbol, &pair, config.interval, Some(gap.since), gap.missing as u32)
            .await
        {
            Ok((_, history)) => {
                store.lock().backfill(&history);
            }
            Err(err) => {
                warn!(
                    symbol = %symbol,
                    missing = gap.missing,
                    error = %err,
                    "backfill failed, gap will be recorded as missing markers"
                );
            }
        }
    }

    if let Some(live) = candles.last() {
        store.lock().append_candle(*live);
    }

    // Scalar metrics ride the candle timeline; index entries have none.
    let mut oi_stale = false;
    let mut funding_stale = false;
    if !coin.index {
        let scalar_ts = store.lock().last_candle_ts();
        if let Some(ts) = scalar_ts {
            let oi_due = store
                .lock()
                .last_scalar_ts(ScalarKind::OpenInterest)
                .map_or(true, |last| last < ts);
            if oi_due {
                match router.fetch_open_interest(&symbol, &pair).await {
                    Ok((_, oi)) => {
                        store.lock().append_scalar(ScalarKind::OpenInterest, ts, oi);
                    }
                    Err(err) => {
                        oi_stale = true;
                        anomalies.push(
                            AnomalyKind::SourcesExhausted,
                            &symbol,
                            format!("open interest: {err}"),
                        );
                    }
                }
            }

            let funding_due = store
                .lock()
                .last_scalar_ts(ScalarKind::FundingRate)
                .map_or(true, |last| last < ts);
            if funding_due {
                match router.fetch_funding_rate(&symbol, &pair).await {
                    Ok((_, rate)) => {
                        store.lock().append_scalar(ScalarKind::FundingRate, ts, rate);
                    }
                    Err(err) => {
                        funding_stale = true;
                        anomalies.push(
                            AnomalyKind::SourcesExhausted,
                            &symbol,
                            format!("funding rate: {err}"),
                        );
                    }
                }
            }
        }
    }

    let freshness = Freshness {
        coin_stale: false,
        oi_stale,
        funding_stale,
        source: Some(source),
        latency_ms: Some(started.elapsed().as_millis() as u64),
    };

    let snapshot = {
        let s = store.lock();
        build_snapshot(&s, &coin, &config.periods, freshness)
    };
    debug!(
        symbol = %symbol,
        price = ?snapshot.price(),
        source = %source,
        "coin snapshot built"
    );

    (symbol, Some(snapshot))
}

/// Assemble a MarketSnapshot from the store's current state plus a fresh
/// indicator computation over its lookback.
fn build_snapshot(
    store: &SeriesStore,
    coin: &CoinConfig,
    periods: &IndicatorPeriods,
    freshness: Freshness,
) -> MarketSnapshot {
    let lookback = store.candle_lookback();
    let computed = indicators::compute(&lookback, periods);
    let published = store.published_len();

    let mut metrics = BTreeMap::new();
    metrics.insert(
        MetricKind::Price,
        MetricReading {
            current: store.last_close(),
            tail: store.close_tail(),
            stale: freshness.coin_stale,
        },
    );

    // Derived metrics inherit the coin-level staleness: they are recomputed
    // from the price buffer, so they are exactly as fresh as it is.
    let derived = [
        (MetricKind::Ema20, &computed.ema),
        (MetricKind::Macd, &computed.macd.macd),
        (MetricKind::Rsi7, &computed.rsi_fast),
        (MetricKind::Rsi14, &computed.rsi_slow),
        (MetricKind::Atr14, &computed.atr),
    ];
    for (kind, series) in derived {
        metrics.insert(
            kind,
            MetricReading {
                current: series.last().copied(),
                tail: tail(series, published),
                stale: freshness.coin_stale,
            },
        );
    }

    if !coin.index {
        metrics.insert(
            MetricKind::OpenInterest,
            MetricReading {
                current: store.last_scalar(ScalarKind::OpenInterest),
                tail: store.scalar_tail(ScalarKind::OpenInterest),
                stale: freshness.coin_stale || freshness.oi_stale,
            },
        );
        metrics.insert(
            MetricKind::FundingRate,
            MetricReading {
                current: store.last_scalar(ScalarKind::FundingRate),
                tail: store.scalar_tail(ScalarKind::FundingRate),
                stale: freshness.coin_stale || freshness.funding_stale,
            },
        );
    }

    MarketSnapshot {
        symbol: coin.symbol.clone(),
        metrics,
        source: freshness.source,
        fetch_latency_ms: freshness.latency_ms,
        stale: freshness.coin_stale,
    }
}

fn tail(series: &[f64], n: usize) -> Vec<f64> {
    let start = series.len().saturating_sub(n);
    series[start..].to_vec()
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;

    use crate::exchange::{ExchangeClient, FetchError};
    use crate::sinks::SnapshotCache;
    use crate::types::SampleInterval;

    const MINUTE: i64 = 60_000;

    /// Scripted result for one candle fetch.
    enum Page {
        Candles(Vec<Candle>),
        Unavailable,
        /// Never resolves — simulates a source that hangs past the cutoff.
        Hang,
    }

    struct MockExchange {
        id: ExchangeId,
        pages: parking_lot::Mutex<VecDeque<Page>>,
        candle_calls: parking_lot::Mutex<Vec<(Option<i64>, u32)>>,
        scalars_fail: bool,
    }

    impl MockExchange {
        fn new(id: ExchangeId, pages: Vec<Page>, scalars_fail: bool) -> Arc<Self> {
            Arc::new(Self {
                id,
                pages: parking_lot::Mutex::new(pages.into()),
                candle_calls: parking_lot::Mutex::new(Vec::new()),
                scalars_fail,
            })
        }

        fn candle_calls(&self) -> Vec<(Option<i64>, u32)> {
            self.candle_calls.lock().clone()
        }
    }

    #[async_trait]
    impl ExchangeClient for MockExchange {
        fn id(&self) -> ExchangeId {
            self.id
        }

        async fn fetch_candles(
            &self,
            _pair: &str,
            _interval: SampleInterval,
            since: Option<i64>,
            limit: u32,
        ) -> Result<Vec<Candle>, FetchError> {
            self.candle_calls.lock().push((since, limit));
            let page = self.pages.lock().pop_front();
            match page {
                Some(Page::Candles(c)) => Ok(c),
                Some(Page::Unavailable) | None => {
                    Err(FetchError::SourceUnavailable("scripted outage".into()))
                }
                Some(Page::Hang) => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }

        async fn fetch_open_interest(&self, _pair: &str) -> Result<f64, FetchError> {
            if self.scalars_fail {
                Err(FetchError::SourceUnavailable("scripted outage".into()))
            } else {
                Ok(1_000.0)
            }
        }

        async fn fetch_funding_rate(&self, _pair: &str) -> Result<f64, FetchError> {
            if self.scalars_fail {
                Err(FetchError::SourceUnavailable("scripted outage".into()))
            } else {
                Ok(0.0001)
            }
        }
    }

    fn candle_at(slot: i64, close: f64) -> Candle {
        let ts = slot * MINUTE - 1;
        Candle::new(ts, close, close + 1.0, close - 1.0, close, 100.0)
    }

    fn ascending_page(first_slot: i64, count: i64, first_close: f64) -> Vec<Candle> {
        (0..count)
            .map(|i| candle_at(first_slot + i, first_close + i as f64))
            .collect()
    }

    fn test_config(symbols: &[&str]) -> PipelineConfig {
        PipelineConfig {
            coins: symbols
                .iter()
                .map(|s| CoinConfig {
                    symbol: s.to_string(),
                    index: false,
                    sources: vec![ExchangeId::Binance],
                })
                .collect(),
            ..Default::default()
        }
    }

    fn coordinator_with(
        config: PipelineConfig,
        clients: Vec<(&str, Arc<dyn ExchangeClient>)>,
        sinks: Vec<Arc<dyn SnapshotSink>>,
    ) -> MarketCoordinator {
        let mut router = SourceRouter::new(config.backoff);
        for (symbol, client) in clients {
            router.add_route(symbol, vec![client]);
        }
        MarketCoordinator::new(config, Arc::new(router), sinks, Arc::new(AnomalyLog::new()))
    }

    #[tokio::test]
    async fn cycle_emits_fresh_and_stale_coins() {
        let good = MockExchange::new(
            ExchangeId::Binance,
            vec![Page::Candles(ascending_page(1, 40, 100.0))],
            false,
        );
        let dead = MockExchange::new(ExchangeId::Binance, vec![Page::Unavailable], false);

        let cache = Arc::new(SnapshotCache::new());
        let coordinator = coordinator_with(
            test_config(&["BTC", "ETH"]),
            vec![("BTC", good), ("ETH", dead)],
            vec![cache.clone()],
        );

        let aggregate = coordinator.run_cycle().await;

        assert_eq!(aggregate.cycle_seq, 1);
        assert_eq!(aggregate.coins.len(), 2);

        let btc = &aggregate.coins["BTC"];
        assert!(!btc.stale);
        assert_eq!(btc.source, Some(ExchangeId::Binance));
        assert!(btc.fetch_latency_ms.is_some());
        assert_eq!(btc.price(), Some(139.0));
        assert_eq!(btc.metrics[&MetricKind::Price].tail.len(), 10);
        assert_eq!(btc.metrics[&MetricKind::OpenInterest].current, Some(1_000.0));

        // ETH never produced data: stale carry-forward with empty history.
        let eth = &aggregate.coins["ETH"];
        assert!(eth.stale);
        assert!(eth.price().is_none());
        assert!(eth.metrics[&MetricKind::Price].tail.is_empty());

        // The cycle was still cached as a whole.
        assert_eq!(cache.latest().unwrap().cycle_seq, 1);
        assert_eq!(coordinator.state(), CycleState::Idle);
    }

    #[tokio::test]
    async fn rising_closes_saturate_rsi_then_one_drop_pulls_it_down() {
        let client = MockExchange::new(
            ExchangeId::Binance,
            vec![
                Page::Candles(ascending_page(1, 15, 100.0)), // closes 100..=114
                Page::Candles(vec![candle_at(16, 100.0)]),   // the drop
            ],
            false,
        );

        let coordinator = coordinator_with(
            test_config(&["BTC"]),
            vec![("BTC", client)],
            Vec::new(),
        );

        let first = coordinator.run_cycle().await;
        let rsi = first.coins["BTC"].metrics[&MetricKind::Rsi14]
            .current
            .expect("RSI(14) defined after 15 closes");
        assert!((rsi - 100.0).abs() < 1e-10, "expected saturated RSI, got {rsi}");

        let second = coordinator.run_cycle().await;
        let rsi = second.coins["BTC"].metrics[&MetricKind::Rsi14]
            .current
            .unwrap();
        assert!(rsi < 100.0, "expected RSI < 100 after a drop, got {rsi}");
    }

    #[tokio::test]
    async fn gap_triggers_one_bounded_backfill_request() {
        let client = MockExchange::new(
            ExchangeId::Binance,
            vec![
                Page::Candles(ascending_page(1, 5, 100.0)), // cycle 1: slots 1..=5
                Page::Candles(vec![candle_at(9, 108.0)]),   // cycle 2: slots 6-8 missing
                Page::Candles(ascending_page(6, 3, 105.0)), // backfill answer
            ],
            false,
        );

        let coordinator = coordinator_with(
            test_config(&["BTC"]),
            vec![("BTC", client.clone())],
            Vec::new(),
        );

        coordinator.run_cycle().await;
        let aggregate = coordinator.run_cycle().await;

        let calls = client.candle_calls();
        assert_eq!(calls.len(), 3);
        // The backfill request starts at the last stored close and is bounded
        // to exactly the missing interval count.
        assert_eq!(calls[2], (Some(5 * MINUTE - 1), 3));

        // The repaired span is dense: the tail walks straight through it.
        let tail = &aggregate.coins["BTC"].metrics[&MetricKind::Price].tail;
        assert_eq!(tail, &vec![100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 106.0, 107.0, 108.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_coin_is_carried_forward_stale() {
        let fast = MockExchange::new(
            ExchangeId::Binance,
            vec![Page::Candles(ascending_page(1, 20, 100.0))],
            false,
        );
        let hung = MockExchange::new(ExchangeId::Binance, vec![Page::Hang], false);

        let config = test_config(&["BTC", "ETH"]);
        let timeout = config.cycle_timeout_secs;
        let coordinator = coordinator_with(config, vec![("BTC", fast), ("ETH", hung)], Vec::new());

        let before = tokio::time::Instant::now();
        let aggregate = coordinator.run_cycle().await;

        // The barrier released exactly at the hard cutoff (virtual time).
        assert_eq!(before.elapsed(), Duration::from_secs(timeout));

        let btc = &aggregate.coins["BTC"];
        assert!(!btc.stale);
        assert_eq!(btc.price(), Some(119.0));

        let eth = &aggregate.coins["ETH"];
        assert!(eth.stale);
        assert!(eth.metrics[&MetricKind::Price].stale);
    }

    #[tokio::test]
    async fn scalar_failure_marks_only_that_metric_stale() {
        let client = MockExchange::new(
            ExchangeId::Binance,
            vec![Page::Candles(ascending_page(1, 20, 100.0))],
            true, // scalars fail, candles succeed
        );

        let coordinator = coordinator_with(
            test_config(&["BTC"]),
            vec![("BTC", client)],
            Vec::new(),
        );

        let aggregate = coordinator.run_cycle().await;
        let btc = &aggregate.coins["BTC"];

        assert!(!btc.stale);
        assert!(!btc.metrics[&MetricKind::Price].stale);
        assert!(btc.metrics[&MetricKind::OpenInterest].stale);
        assert!(btc.metrics[&MetricKind::FundingRate].stale);
        // Carried value: nothing was ever stored for the scalars.
        assert!(btc.metrics[&MetricKind::OpenInterest].current.is_none());
        assert!(btc.any_stale());
    }

    #[tokio::test]
    async fn second_cycle_without_new_candles_keeps_last_values() {
        let client = MockExchange::new(
            ExchangeId::Binance,
            vec![
                Page::Candles(ascending_page(1, 20, 100.0)),
                Page::Candles(Vec::new()), // nothing new closed yet
            ],
            false,
        );

        let coordinator = coordinator_with(
            test_config(&["BTC"]),
            vec![("BTC", client)],
            Vec::new(),
        );

        let first = coordinator.run_cycle().await;
        let second = coordinator.run_cycle().await;

        assert_eq!(first.coins["BTC"].price(), Some(119.0));
        assert_eq!(second.coins["BTC"].price(), Some(119.0));
        assert!(!second.coins["BTC"].stale);
        assert_eq!(second.cycle_seq, 2);
    }

    #[tokio::test]
    async fn index_coin_publishes_no_scalar_metrics() {
        let client = MockExchange::new(
            ExchangeId::GlobalIndex,
            vec![Page::Candles(ascending_page(1, 20, 52.0))],
            true,
        );

        let mut config = test_config(&["BTC.D"]);
        config.coins[0].index = true;
        config.coins[0].sources = vec![ExchangeId::GlobalIndex];

        let coordinator = coordinator_with(config, vec![("BTC.D", client)], Vec::new());

        let aggregate = coordinator.run_cycle().await;
        let dom = &aggregate.coins["BTC.D"];

        assert!(!dom.stale);
        assert!(dom.price().is_some());
        assert!(!dom.metrics.contains_key(&MetricKind::OpenInterest));
        assert!(!dom.metrics.contains_key(&MetricKind::FundingRate));
    }
}
