// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = value_t * multiplier + EMA_{t-1} * (1 - multiplier)
//              = EMA_{t-1} + multiplier * (value_t - EMA_{t-1})
//
// The second (incremental) form is what is evaluated: a constant input then
// stays bit-for-bit constant.
//
// The recursion is seeded with the first value (EMA_0 = value_0), so a value
// exists at every index.  The first `period - 1` of them are warm-up and are
// reported as `None`.
// =============================================================================

/// Number of leading warm-up positions for an EMA of `period`.
pub fn warmup(period: usize) -> usize {
    period.saturating_sub(1)
}

/// Best-effort EMA at every index, including warm-up positions.
///
/// Returns an empty vec for `period == 0`.  Once a non-finite value appears
/// the remainder of the output is NaN.
pub fn ema_values(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.is_empty() {
        return Vec::new();
    }
    if period == 1 {
        return values.to_vec();
    }
    let multiplier = 2.0 / (period + 1) as f64;

    let mut result = Vec::with_capacity(values.len());
    let mut prev = values[0];
    result.push(prev);
    for &value in &values[1..] {
        prev += multiplier * (value - prev);
        result.push(prev);
    }
    result
}

/// EMA column aligned with `values`; warm-up and non-finite positions are
/// `None`.
///
/// # Edge cases
/// - `period == 0` => every position is `None`
/// - `period == 1` => the EMA equals the input at every index
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }
    let skip = warmup(period);
    ema_values(values, period)
        .into_iter()
        .enumerate()
        .map(|(i, v)| (i >= skip && v.is_finite()).then_some(v))
        .collect()
}
