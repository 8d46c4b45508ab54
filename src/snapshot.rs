// =============================================================================
// Snapshot value objects — the unit of work handed to sinks
// =============================================================================
//
// Both structs are plain values rebuilt from scratch every cycle; nothing
// mutates one after it has been handed to a sink.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::types::{ExchangeId, MetricKind};

/// Current value and published tail of one metric.
#[derive(Debug, Clone, Serialize)]
pub struct MetricReading {
    /// Latest known value; `None` when nothing was ever stored.
    pub current: Option<f64>,
    /// Published tail, oldest first, at most `published_len` entries.
    pub tail: Vec<f64>,
    /// True when this cycle could not refresh the value and the previous one
    /// was carried forward.
    pub stale: bool,
}

/// Everything published for one coin this cycle.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub metrics: BTreeMap<MetricKind, MetricReading>,
    /// Exchange that served the candle fetch, when it succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ExchangeId>,
    /// Wall-clock duration of this coin's fetch work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_latency_ms: Option<u64>,
    /// Coin-level staleness: the candle fetch itself failed or timed out.
    pub stale: bool,
}

impl MarketSnapshot {
    /// Latest price, if any cycle ever stored one.
    pub fn price(&self) -> Option<f64> {
        self.metrics
            .get(&MetricKind::Price)
            .and_then(|m| m.current)
    }

    /// True when any metric carries a stale flag.
    pub fn any_stale(&self) -> bool {
        self.stale || self.metrics.values().any(|m| m.stale)
    }
}

/// All coins for one logical cycle.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateSnapshot {
    /// Random identifier for this cycle, for correlating sink output.
    pub cycle_id: Uuid,
    /// Monotonically increasing cycle counter.
    pub cycle_seq: u64,
    /// Logical cycle timestamp, milliseconds.
    pub cycle_ts: i64,
    pub coins: BTreeMap<String, MarketSnapshot>,
}

impl AggregateSnapshot {
    pub fn new(cycle_seq: u64, cycle_ts: i64, coins: BTreeMap<String, MarketSnapshot>) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            cycle_seq,
            cycle_ts,
            coins,
        }
    }

    /// Number of coins whose snapshot is fully fresh this cycle.
    pub fn fresh_count(&self) -> usize {
        self.coins.values().filter(|c| !c.any_stale()).count()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn reading(current: f64, stale: bool) -> MetricReading {
        MetricReading {
            current: Some(current),
            tail: vec![current],
            stale,
        }
    }

    fn snapshot(symbol: &str, stale: bool) -> MarketSnapshot {
        let mut metrics = BTreeMap::new();
        metrics.insert(MetricKind::Price, reading(100.0, false));
        metrics.insert(MetricKind::Rsi14, reading(55.0, false));
        MarketSnapshot {
            symbol: symbol.to_string(),
            metrics,
            source: Some(ExchangeId::Binance),
            fetch_latency_ms: Some(12),
            stale,
        }
    }

    #[test]
    fn price_reads_the_price_metric() {
        let snap = snapshot("BTC", false);
        assert_eq!(snap.price(), Some(100.0));
    }

    #[test]
    fn any_stale_covers_coin_and_metric_level() {
        let fresh = snapshot("BTC", false);
        assert!(!fresh.any_stale());

        let coin_stale = snapshot("BTC", true);
        assert!(coin_stale.any_stale());

        let mut metric_stale = snapshot("BTC", false);
        metric_stale
            .metrics
            .insert(MetricKind::FundingRate, reading(0.0001, true));
        assert!(metric_stale.any_stale());
    }

    #[test]
    fn aggregate_counts_fresh_coins() {
        let mut coins = BTreeMap::new();
        coins.insert("BTC".to_string(), snapshot("BTC", false));
        coins.insert("ETH".to_string(), snapshot("ETH", true));
        let agg = AggregateSnapshot::new(7, 1_700_000_000_000, coins);

        assert_eq!(agg.cycle_seq, 7);
        assert_eq!(agg.fresh_count(), 1);
    }

    #[test]
    fn aggregate_serialises_with_metric_names_as_keys() {
        let mut coins = BTreeMap::new();
        coins.insert("BTC".to_string(), snapshot("BTC", false));
        let agg = AggregateSnapshot::new(1, 1_700_000_000_000, coins);

        let json = serde_json::to_value(&agg).unwrap();
        assert!(json["coins"]["BTC"]["metrics"]["price"]["current"].is_number());
        assert_eq!(json["coins"]["BTC"]["metrics"]["rsi14"]["stale"], false);
        assert_eq!(json["cycle_seq"], 1);
    }
}
