// =============================================================================
// Shared types used across the Meridian feed pipeline
// =============================================================================

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Identifies a data source that can serve market data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangeId {
    Binance,
    Bybit,
    /// Aggregated-index provider used for the dominance metric, not a
    /// tradeable exchange.
    GlobalIndex,
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binance => write!(f, "binance"),
            Self::Bybit => write!(f, "bybit"),
            Self::GlobalIndex => write!(f, "global-index"),
        }
    }
}

/// Closed set of metrics tracked per coin.
///
/// Replaces the stringly-keyed series maps of earlier revisions: every lookup
/// is now an enum match, so a typo in a metric name is a compile error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Price,
    Ema20,
    Macd,
    Rsi7,
    Rsi14,
    Atr14,
    OpenInterest,
    FundingRate,
}

impl MetricKind {
    /// Metrics recomputed from the candle buffer rather than fetched.
    pub fn is_derived(self) -> bool {
        matches!(
            self,
            MetricKind::Ema20
                | MetricKind::Macd
                | MetricKind::Rsi7
                | MetricKind::Rsi14
                | MetricKind::Atr14
        )
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Price => write!(f, "price"),
            Self::Ema20 => write!(f, "ema20"),
            Self::Macd => write!(f, "macd"),
            Self::Rsi7 => write!(f, "rsi7"),
            Self::Rsi14 => write!(f, "rsi14"),
            Self::Atr14 => write!(f, "atr14"),
            Self::OpenInterest => write!(f, "open_interest"),
            Self::FundingRate => write!(f, "funding_rate"),
        }
    }
}

/// Candle sampling cadence. Also the cycle cadence of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleInterval {
    OneMinute,
    ThreeMinutes,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
}

impl SampleInterval {
    pub fn as_millis(self) -> i64 {
        match self {
            Self::OneMinute => 60_000,
            Self::ThreeMinutes => 180_000,
            Self::FiveMinutes => 300_000,
            Self::FifteenMinutes => 900_000,
            Self::OneHour => 3_600_000,
        }
    }

    pub fn as_secs(self) -> u64 {
        (self.as_millis() / 1000) as u64
    }

    /// Interval code used by the Binance klines endpoint.
    pub fn binance_code(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::ThreeMinutes => "3m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
        }
    }

    /// Interval code used by the Bybit v5 kline endpoint (minutes as digits).
    pub fn bybit_code(self) -> &'static str {
        match self {
            Self::OneMinute => "1",
            Self::ThreeMinutes => "3",
            Self::FiveMinutes => "5",
            Self::FifteenMinutes => "15",
            Self::OneHour => "60",
        }
    }
}

impl Default for SampleInterval {
    fn default() -> Self {
        Self::OneMinute
    }
}

impl std::fmt::Display for SampleInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.binance_code())
    }
}

/// A single OHLCV candle. `ts` is the exchange-reported close time in
/// milliseconds; per coin these are monotonically non-decreasing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub ts: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(ts: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

// =============================================================================
// Anomaly log
// =============================================================================

/// Maximum number of recent anomalies to retain.
const MAX_RECENT_ANOMALIES: usize = 50;

/// Classification of a recorded data anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Append with a timestamp at or before the last stored one (dropped).
    MonotonicityViolation,
    /// A gap that backfill could not repair; missing markers were recorded.
    GapUnfilled,
    /// Every configured source failed for one metric this cycle.
    SourcesExhausted,
    /// A cycle hit the hard timeout and was abandoned with partial results.
    CycleTimeout,
}

/// One recorded anomaly, retained for operator inspection.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyRecord {
    pub kind: AnomalyKind,
    pub coin: String,
    pub detail: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Bounded ring of recent anomalies shared across the pipeline.
pub struct AnomalyLog {
    records: RwLock<Vec<AnomalyRecord>>,
}

impl AnomalyLog {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Record an anomaly, evicting the oldest entries past the cap.
    pub fn push(&self, kind: AnomalyKind, coin: &str, detail: impl Into<String>) {
        let record = AnomalyRecord {
            kind,
            coin: coin.to_string(),
            detail: detail.into(),
            at: chrono::Utc::now().to_rfc3339(),
        };

        let mut records = self.records.write();
        records.push(record);
        while records.len() > MAX_RECENT_ANOMALIES {
            records.remove(0);
        }
    }

    /// Snapshot of the current anomaly ring (oldest first).
    pub fn recent(&self) -> Vec<AnomalyRecord> {
        self.records.read().clone()
    }
}

impl Default for AnomalyLog {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_kind_derived_split() {
        assert!(MetricKind::Ema20.is_derived());
        assert!(MetricKind::Atr14.is_derived());
        assert!(!MetricKind::Price.is_derived());
        assert!(!MetricKind::OpenInterest.is_derived());
        assert!(!MetricKind::FundingRate.is_derived());
    }

    #[test]
    fn interval_codes_agree_on_duration() {
        assert_eq!(SampleInterval::OneMinute.as_millis(), 60_000);
        assert_eq!(SampleInterval::OneMinute.as_secs(), 60);
        assert_eq!(SampleInterval::ThreeMinutes.binance_code(), "3m");
        assert_eq!(SampleInterval::ThreeMinutes.bybit_code(), "3");
        assert_eq!(SampleInterval::OneHour.bybit_code(), "60");
    }

    #[test]
    fn anomaly_log_caps_entries() {
        let log = AnomalyLog::new();
        for i in 0..60 {
            log.push(AnomalyKind::GapUnfilled, "BTC", format!("gap {i}"));
        }
        let recent = log.recent();
        assert_eq!(recent.len(), 50);
        // Oldest entries evicted first.
        assert_eq!(recent[0].detail, "gap 10");
        assert_eq!(recent[49].detail, "gap 59");
    }

    #[test]
    fn metric_kind_serialises_snake_case() {
        let json = serde_json::to_string(&MetricKind::OpenInterest).unwrap();
        assert_eq!(json, "\"open_interest\"");
        let back: MetricKind = serde_json::from_str("\"funding_rate\"").unwrap();
        assert_eq!(back, MetricKind::FundingRate);
    }
}
