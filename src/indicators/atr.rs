// =============================================================================
// Average True Range (ATR) — Wilder's Smoothing Method
// =============================================================================
//
// True Range for each bar:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR is the Wilder-smoothed average of TR:
//   ATR_0 = SMA of first `period` TR values
//   ATR_t = (ATR_{t-1} * (period - 1) + TR_t) / period
// =============================================================================

use crate::types::Candle;

/// Compute the full ATR series for `candles` (oldest first) and `period`.
///
/// The first value corresponds to the candle at index `period` (a candle
/// needs a predecessor for its True Range, and `period` TR values seed the
/// average).  Insufficient data yields an empty vec.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() < period + 1 {
        return Vec::new();
    }

    let mut tr_values: Vec<f64> = Vec::with_capacity(candles.len() - 1);
    for i in 1..candles.len() {
        let high = candles[i].high;
        let low = candles[i].low;
        let prev_close = candles[i - 1].close;

        let hl = high - low;
        let hc = (high - prev_close).abs();
        let lc = (low - prev_close).abs();

        tr_values.push(hl.max(hc).max(lc));
    }

    let seed: f64 = tr_values[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let period_f = period as f64;
    let mut result = Vec::with_capacity(tr_values.len() - period + 1);
    result.push(seed);

    let mut atr = seed;
    for &tr in &tr_values[period..] {
        atr = (atr * (period_f - 1.0) + tr) / period_f;
        if !atr.is_finite() {
            break;
        }
        result.push(atr);
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, open, high, low, close, 100.0)
    }

    #[test]
    fn atr_period_zero() {
        let candles = vec![candle(100.0, 105.0, 95.0, 102.0); 20];
        assert!(calculate_atr(&candles, 0).is_empty());
    }

    #[test]
    fn atr_insufficient_data_is_undefined() {
        // period=14 needs 15 candles; 10 is short.
        let candles = vec![candle(100.0, 105.0, 95.0, 102.0); 10];
        assert!(calculate_atr(&candles, 14).is_empty());
    }

    #[test]
    fn atr_exact_minimum_data() {
        // period=3, four candles give exactly three TR values — one output.
        let candles = vec![
            candle(100.0, 102.0, 98.0, 101.0),
            candle(101.0, 104.0, 99.0, 103.0),
            candle(103.0, 106.0, 100.0, 105.0),
            candle(105.0, 108.0, 102.0, 107.0),
        ];
        let atr = calculate_atr(&candles, 3);
        assert_eq!(atr.len(), 1);
        assert!(atr[0] > 0.0);
        assert!(atr[0].is_finite());
    }

    #[test]
    fn atr_constant_range_converges() {
        // Same H-L spread everywhere: ATR settles near the spread.
        let mut candles = Vec::new();
        for i in 0..30 {
            let base = 100.0 + i as f64 * 0.1;
            candles.push(candle(base, base + 5.0, base - 5.0, base));
        }
        let atr = *calculate_atr(&candles, 14).last().unwrap();
        assert!((atr - 10.0).abs() < 1.0, "expected ATR near 10.0, got {atr}");
    }

    #[test]
    fn atr_true_range_uses_prev_close() {
        // Gap up: |H - prevClose| dominates H - L.
        let candles = vec![
            candle(100.0, 105.0, 95.0, 95.0),
            candle(110.0, 115.0, 108.0, 112.0), // |115-95|=20 > 115-108=7
            candle(112.0, 118.0, 110.0, 115.0),
            candle(115.0, 120.0, 113.0, 118.0),
        ];
        let atr = *calculate_atr(&candles, 3).last().unwrap();
        assert!(atr > 7.0, "ATR should reflect the gap, got {atr}");
    }

    #[test]
    fn atr_series_grows_with_input() {
        let candles: Vec<Candle> = (0..50)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.5).sin() * 10.0;
                candle(base - 0.5, base + 2.0, base - 2.0, base + 0.5)
            })
            .collect();
        let series = calculate_atr(&candles, 14);
        // 49 TR values, 14 consumed by the seed.
        assert_eq!(series.len(), 49 - 14 + 1);
        assert!(series.iter().all(|v| *v > 0.0));
    }

    #[test]
    fn atr_is_deterministic_bit_for_bit() {
        let candles: Vec<Candle> = (0..40)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.3).cos() * 8.0;
                candle(base, base + 3.0, base - 3.0, base + 1.0)
            })
            .collect();
        let first = calculate_atr(&candles, 14);
        let second = calculate_atr(&candles, 14);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn atr_nan_truncates_series() {
        let mut candles = vec![candle(100.0, 105.0, 95.0, 100.0); 20];
        // Both extremes poisoned: every True-Range component is NaN.
        candles[18] = candle(100.0, f64::NAN, f64::NAN, 100.0);
        let series = calculate_atr(&candles, 3);
        // Output stops before the poisoned bar reaches the recurrence.
        assert!(series.len() < 17);
        assert!(series.iter().all(|v| v.is_finite()));
    }
}
