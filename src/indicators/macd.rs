// =============================================================================
// Moving Average Convergence/Divergence (MACD)
// =============================================================================
//
// MACD line  = EMA(fast) - EMA(slow)        (12 / 26 by default)
// Signal     = EMA(signal) of the MACD line (9 by default)
// Histogram  = MACD - Signal
//
// Each series honours its own warm-up: the MACD line starts once the slow
// EMA is defined, the signal once `signal_period` MACD values exist.
// =============================================================================

use super::ema::calculate_ema;

/// MACD output series, each oldest-first.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    /// One value per close starting at index `slow - 1` of the input.
    pub macd: Vec<f64>,
    /// One value per MACD entry starting at index `signal_period - 1`.
    pub signal: Vec<f64>,
    /// Aligned with `signal`.
    pub histogram: Vec<f64>,
}

impl MacdSeries {
    fn empty() -> Self {
        Self {
            macd: Vec::new(),
            signal: Vec::new(),
            histogram: Vec::new(),
        }
    }
}

/// Compute MACD, signal, and histogram series for `closes`.
///
/// Empty output when `closes` is shorter than `slow` or any period is
/// degenerate (`fast >= slow`, zero periods).
pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> MacdSeries {
    if fast == 0 || signal_period == 0 || fast >= slow || closes.len() < slow {
        return MacdSeries::empty();
    }

    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);
    if ema_slow.is_empty() {
        return MacdSeries::empty();
    }

    // ema_fast[i] pairs with close index i + fast - 1; ema_slow with
    // i + slow - 1.  Align both to the slow tail.
    let offset = slow - fast;
    let macd: Vec<f64> = ema_slow
        .iter()
        .enumerate()
        .map(|(i, &s)| ema_fast[i + offset] - s)
        .collect();

    let signal = calculate_ema(&macd, signal_period);
    let histogram: Vec<f64> = signal
        .iter()
        .enumerate()
        .map(|(i, &s)| macd[i + signal_period - 1] - s)
        .collect();

    MacdSeries {
        macd,
        signal,
        histogram,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_insufficient_data_is_undefined() {
        let closes: Vec<f64> = (1..=25).map(|x| x as f64).collect();
        let out = calculate_macd(&closes, 12, 26, 9);
        assert!(out.macd.is_empty());
        assert!(out.signal.is_empty());
        assert!(out.histogram.is_empty());
    }

    #[test]
    fn macd_degenerate_periods_are_rejected() {
        let closes = vec![1.0; 60];
        assert!(calculate_macd(&closes, 0, 26, 9).macd.is_empty());
        assert!(calculate_macd(&closes, 26, 26, 9).macd.is_empty());
        assert!(calculate_macd(&closes, 12, 26, 0).macd.is_empty());
    }

    #[test]
    fn macd_line_starts_with_the_slow_ema() {
        let closes: Vec<f64> = (1..=60).map(|x| x as f64).collect();
        let out = calculate_macd(&closes, 12, 26, 9);
        // One MACD value per slow-EMA value.
        assert_eq!(out.macd.len(), 60 - 26 + 1);
        // Signal consumes its own warm-up over the MACD series.
        assert_eq!(out.signal.len(), out.macd.len() - 9 + 1);
        assert_eq!(out.histogram.len(), out.signal.len());
    }

    #[test]
    fn macd_positive_in_an_uptrend() {
        // In a steady uptrend the fast EMA rides above the slow one.
        let closes: Vec<f64> = (1..=80).map(|x| x as f64).collect();
        let out = calculate_macd(&closes, 12, 26, 9);
        assert!(*out.macd.last().unwrap() > 0.0);
        assert!(*out.signal.last().unwrap() > 0.0);
    }

    #[test]
    fn macd_negative_in_a_downtrend() {
        let closes: Vec<f64> = (1..=80).rev().map(|x| x as f64).collect();
        let out = calculate_macd(&closes, 12, 26, 9);
        assert!(*out.macd.last().unwrap() < 0.0);
    }

    #[test]
    fn macd_flat_series_is_zero() {
        let closes = vec![100.0; 60];
        let out = calculate_macd(&closes, 12, 26, 9);
        for &v in &out.macd {
            assert!(v.abs() < 1e-10);
        }
        for &v in &out.histogram {
            assert!(v.abs() < 1e-10);
        }
    }

    #[test]
    fn histogram_is_macd_minus_signal() {
        let closes: Vec<f64> = (0..70).map(|i| 100.0 + (i as f64 * 0.4).sin() * 6.0).collect();
        let out = calculate_macd(&closes, 12, 26, 9);
        for (i, &h) in out.histogram.iter().enumerate() {
            let expected = out.macd[i + 9 - 1] - out.signal[i];
            assert!((h - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn macd_is_deterministic_bit_for_bit() {
        let closes: Vec<f64> = (0..70).map(|i| 100.0 + (i as f64 * 1.3).sin() * 3.0).collect();
        let first = calculate_macd(&closes, 12, 26, 9);
        let second = calculate_macd(&closes, 12, 26, 9);
        assert_eq!(first, second);
        for (a, b) in first.signal.iter().zip(second.signal.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
