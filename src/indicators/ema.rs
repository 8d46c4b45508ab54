// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = value_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The first EMA value is seeded with the SMA of the first `period` inputs.
// =============================================================================

/// Compute the EMA series for `values` with look-back `period`.
///
/// Returns an empty `Vec` when the input is too short or the period is zero —
/// the indicator is undefined until `period` values exist, never zero.  Each
/// output element corresponds to an input starting at index `period - 1`.
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period + 1) as f64;

    // Seed: SMA of the first `period` values.
    let sma: f64 = values[..period].iter().sum::<f64>() / period as f64;
    if !sma.is_finite() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(values.len() - period + 1);
    result.push(sma);

    let mut prev = sma;
    for &value in &values[period..] {
        let ema = value * multiplier + prev * (1.0 - multiplier);
        if !ema.is_finite() {
            // A broken series must not leak into later valid computations.
            break;
        }
        result.push(ema);
        prev = ema;
    }

    result
}
