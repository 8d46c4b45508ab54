// =============================================================================
// Indicator Engine
// =============================================================================
//
// Pure, side-effect-free computation of every derived metric from a coin's
// candle lookback.  No state survives between cycles: recomputing from the
// same buffer reproduces the same output bit for bit.
//
// Missing-marker policy: a marker slot is resolved by repeating the previous
// real candle before any recurrence runs — never NaN, never zero.  A repeated
// candle has zero price delta and an unchanged range, so RSI/EMA/MACD see a
// flat market and ATR re-averages the old range during an outage.  This
// deliberately damps volatility-sensitive indicators while data is missing;
// downstream consumers are tuned to that behavior, so changing it is a
// product decision, not a refactor.

pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;

pub use atr::calculate_atr;
pub use ema::calculate_ema;
pub use macd::{calculate_macd, MacdSeries};
pub use rsi::calculate_rsi;

use crate::config::IndicatorPeriods;
use crate::series::CandlePoint;
use crate::types::Candle;

/// Every derived series for one coin, computed in one pass.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub ema: Vec<f64>,
    pub macd: MacdSeries,
    pub rsi_fast: Vec<f64>,
    pub rsi_slow: Vec<f64>,
    pub atr: Vec<f64>,
}

/// Resolve a lookback with markers into a dense candle sequence by carrying
/// the previous real candle forward.  Leading markers (nothing to carry) are
/// dropped.
pub fn resolve_carry_forward(points: &[CandlePoint]) -> Vec<Candle> {
    let mut out = Vec::with_capacity(points.len());
    let mut prev: Option<Candle> = None;
    for point in points {
        match point.candle {
            Some(c) => {
                prev = Some(c);
                out.push(c);
            }
            None => {
                if let Some(mut carried) = prev {
                    carried.ts = point.ts;
                    out.push(carried);
                }
            }
        }
    }
    out
}

/// Compute the full indicator set from a candle lookback.
pub fn compute(points: &[CandlePoint], periods: &IndicatorPeriods) -> IndicatorSet {
    let candles = resolve_carry_forward(points);
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    IndicatorSet {
        ema: calculate_ema(&closes, periods.ema),
        macd: calculate_macd(
            &closes,
            periods.macd_fast,
            periods.macd_slow,
            periods.macd_signal,
        ),
        rsi_fast: calculate_rsi(&closes, periods.rsi_fast),
        rsi_slow: calculate_rsi(&closes, periods.rsi_slow),
        atr: calculate_atr(&candles, periods.atr),
    }
}
