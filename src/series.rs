// =============================================================================
// SeriesStore — gap-checked rolling history for one coin
// =============================================================================
//
// Holds the candle series plus the scalar series (open interest, funding
// rate) for a single coin.  Exactly one task writes to a store per cycle, so
// the struct itself is single-threaded; the coordinator wraps it in a mutex
// only to move it across tasks.
//
// Invariants maintained here:
//   * timestamps are strictly increasing; a stale or duplicate timestamp is
//     dropped as a no-op and logged as an anomaly
//   * once an append completes, consecutive entries are one sampling interval
//     apart — slots that could not be backfilled hold an explicit missing
//     marker rather than silently collapsing the timeline
//   * the buffer never exceeds `lookback_len` entries; oldest evicted first
//   * the published tail is always a slice of the long buffer, never an
//     independently stored copy
// =============================================================================

use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::types::{AnomalyKind, AnomalyLog, Candle, SampleInterval};

/// One slot of the candle series.  `None` marks a gap backfill could not
/// repair.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CandlePoint {
    pub ts: i64,
    pub candle: Option<Candle>,
}

/// One slot of a scalar series.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricPoint {
    pub ts: i64,
    pub value: Option<f64>,
}

/// Result of an append against the monotonicity rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Value stored; `gap_markers` missing slots were recorded before it.
    Appended { gap_markers: usize },
    /// Timestamp at or before the last stored one; nothing changed.
    RejectedNonMonotonic,
}

/// A detected gap, sized for the bounded backfill request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapInfo {
    /// Whole sampling intervals missing between the last stored point and
    /// the incoming one.
    pub missing: usize,
    /// Last stored timestamp; backfill fetches start here (exclusive).
    pub since: i64,
}

/// Rolling per-coin history: candles plus scalar metrics.
pub struct SeriesStore {
    symbol: String,
    interval_ms: i64,
    lookback_len: usize,
    published_len: usize,
    candles: VecDeque<CandlePoint>,
    open_interest: VecDeque<MetricPoint>,
    funding_rate: VecDeque<MetricPoint>,
    anomalies: Arc<AnomalyLog>,
}

impl SeriesStore {
    pub fn new(
        symbol: impl Into<String>,
        interval: SampleInterval,
        lookback_len: usize,
        published_len: usize,
        anomalies: Arc<AnomalyLog>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            interval_ms: interval.as_millis(),
            lookback_len,
            published_len,
            candles: VecDeque::with_capacity(lookback_len + 1),
            open_interest: VecDeque::with_capacity(lookback_len + 1),
            funding_rate: VecDeque::with_capacity(lookback_len + 1),
            anomalies,
        }
    }

    pub fn last_candle_ts(&self) -> Option<i64> {
        self.candles.back().map(|p| p.ts)
    }

    /// Close of the most recent real candle, skipping missing markers.
    pub fn last_close(&self) -> Option<f64> {
        self.candles
            .iter()
            .rev()
            .find_map(|p| p.candle.map(|c| c.close))
    }

    pub fn candle_count(&self) -> usize {
        self.candles.len()
    }

    /// Whole missing intervals between the last stored timestamp and `ts`.
    fn missing_between(&self, ts: i64) -> usize {
        match self.last_candle_ts() {
            Some(last) if ts > last => ((ts - last - 1) / self.interval_ms) as usize,
            _ => 0,
        }
    }

    /// Check whether appending a candle at `ts` would cross a gap.  Pure
    /// probe: the caller runs one bounded backfill through the router before
    /// committing the live value.
    pub fn probe_gap(&self, ts: i64) -> Option<GapInfo> {
        let missing = self.missing_between(ts);
        if missing == 0 {
            return None;
        }
        Some(GapInfo {
            missing,
            since: self.last_candle_ts().expect("gap requires a stored point"),
        })
    }

    /// Insert historical candles fetched for a gap.  Each candle lands at its
    /// chronological position (appends, in order, after the current tail);
    /// candles at or before the last stored timestamp are skipped.  Holes
    /// inside the fetched span become markers so the timeline stays dense.
    ///
    /// Returns how many real candles were accepted.
    pub fn backfill(&mut self, candles: &[Candle]) -> usize {
        let mut accepted = 0;
        for candle in candles {
            match self.push_candle(*candle) {
                AppendOutcome::Appended { .. } => accepted += 1,
                AppendOutcome::RejectedNonMonotonic => {}
            }
        }
        if accepted > 0 {
            debug!(symbol = %self.symbol, accepted, "backfill candles inserted");
        }
        accepted
    }

    /// Append the live candle for this cycle.  Slots between the stored tail
    /// and the candle that are still empty after backfill become explicit
    /// missing markers — the store accepts the live value regardless and
    /// never blocks on an unfillable gap.
    pub fn append_candle(&mut self, candle: Candle) -> AppendOutcome {
        let outcome = self.push_candle(candle);
        if let AppendOutcome::Appended { gap_markers } = outcome {
            if gap_markers > 0 {
                self.anomalies.push(
                    AnomalyKind::GapUnfilled,
                    &self.symbol,
                    format!("{gap_markers} interval(s) left as missing markers"),
                );
            }
        }
        outcome
    }

    fn push_candle(&mut self, candle: Candle) -> AppendOutcome {
        if let Some(last) = self.last_candle_ts() {
            if candle.ts <= last {
                warn!(
                    symbol = %self.symbol,
                    ts = candle.ts,
                    last_ts = last,
                    "dropping candle with non-monotonic timestamp"
                );
                self.anomalies.push(
                    AnomalyKind::MonotonicityViolation,
                    &self.symbol,
                    format!("candle ts {} <= last stored {}", candle.ts, last),
                );
                return AppendOutcome::RejectedNonMonotonic;
            }
        }

        let gap_markers = self.missing_between(candle.ts);
        if gap_markers > 0 {
            let last = self.last_candle_ts().expect("gap requires a stored point");
            for i in 1..=gap_markers as i64 {
                self.candles.push_back(CandlePoint {
                    ts: last + i * self.interval_ms,
                    candle: None,
                });
            }
        }

        self.candles.push_back(CandlePoint {
            ts: candle.ts,
            candle: Some(candle),
        });

        while self.candles.len() > self.lookback_len {
            self.candles.pop_front();
        }

        AppendOutcome::Appended { gap_markers }
    }

    /// Append a scalar metric sample (open interest or funding rate).  Same
    /// monotonicity rule as candles; missing intervals become markers.
    pub fn append_scalar(&mut self, series: ScalarKind, ts: i64, value: f64) -> AppendOutcome {
        let symbol = self.symbol.clone();
        let interval_ms = self.interval_ms;
        let lookback_len = self.lookback_len;
        let anomalies = Arc::clone(&self.anomalies);
        let buf = self.scalar_mut(series);

        if let Some(last) = buf.back().map(|p| p.ts) {
            if ts <= last {
                warn!(
                    symbol = %symbol,
                    series = ?series,
                    ts,
                    last_ts = last,
                    "dropping scalar sample with non-monotonic timestamp"
                );
                anomalies.push(
                    AnomalyKind::MonotonicityViolation,
                    &symbol,
                    format!("{series:?} ts {ts} <= last stored {last}"),
                );
                return AppendOutcome::RejectedNonMonotonic;
            }
        }

        let gap_markers = match buf.back().map(|p| p.ts) {
            Some(last) if ts > last => ((ts - last - 1) / interval_ms) as usize,
            _ => 0,
        };
        if gap_markers > 0 {
            let last = buf.back().map(|p| p.ts).expect("gap requires a stored point");
            for i in 1..=gap_markers as i64 {
                buf.push_back(MetricPoint {
                    ts: last + i * interval_ms,
                    value: None,
                });
            }
        }

        buf.push_back(MetricPoint { ts, value: Some(value) });

        while buf.len() > lookback_len {
            buf.pop_front();
        }

        AppendOutcome::Appended { gap_markers }
    }

    fn scalar_mut(&mut self, series: ScalarKind) -> &mut VecDeque<MetricPoint> {
        match series {
            ScalarKind::OpenInterest => &mut self.open_interest,
            ScalarKind::FundingRate => &mut self.funding_rate,
        }
    }

    fn scalar(&self, series: ScalarKind) -> &VecDeque<MetricPoint> {
        match series {
            ScalarKind::OpenInterest => &self.open_interest,
            ScalarKind::FundingRate => &self.funding_rate,
        }
    }

    /// Full candle lookback, oldest first (markers included).
    pub fn candle_lookback(&self) -> Vec<CandlePoint> {
        self.candles.iter().copied().collect()
    }

    /// Published close-price tail: the last `published_len` slots resolved by
    /// carrying the previous real close through markers.  Leading markers with
    /// no prior real value are omitted.
    pub fn close_tail(&self) -> Vec<f64> {
        let resolved = resolve_closes(self.candles.iter().copied());
        tail(&resolved, self.published_len)
    }

    /// Published tail of a scalar series, carry-forward resolved.
    pub fn scalar_tail(&self, series: ScalarKind) -> Vec<f64> {
        let resolved = resolve_values(self.scalar(series).iter().copied());
        tail(&resolved, self.published_len)
    }

    /// Latest real value of a scalar series, if any was ever stored.
    pub fn last_scalar(&self, series: ScalarKind) -> Option<f64> {
        self.scalar(series).iter().rev().find_map(|p| p.value)
    }

    /// Timestamp of the newest slot in a scalar series (marker or real).
    pub fn last_scalar_ts(&self, series: ScalarKind) -> Option<i64> {
        self.scalar(series).back().map(|p| p.ts)
    }

    pub fn published_len(&self) -> usize {
        self.published_len
    }
}

/// Which scalar series an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    OpenInterest,
    FundingRate,
}

/// Resolve a candle series to dense closes: markers repeat the previous real
/// close; leading markers are dropped.
fn resolve_closes(points: impl Iterator<Item = CandlePoint>) -> Vec<f64> {
    let mut out = Vec::new();
    let mut prev: Option<f64> = None;
    for point in points {
        match point.candle {
            Some(c) => {
                prev = Some(c.close);
                out.push(c.close);
            }
            None => {
                if let Some(v) = prev {
                    out.push(v);
                }
            }
        }
    }
    out
}

/// Resolve a scalar series the same way.
fn resolve_values(points: impl Iterator<Item = MetricPoint>) -> Vec<f64> {
    let mut out = Vec::new();
    let mut prev: Option<f64> = None;
    for point in points {
        match point.value {
            Some(v) => {
                prev = Some(v);
                out.push(v);
            }
            None => {
                if let Some(v) = prev {
                    out.push(v);
                }
            }
        }
    }
    out
}

fn tail(values: &[f64], n: usize) -> Vec<f64> {
    let start = values.len().saturating_sub(n);
    values[start..].to_vec()
}
