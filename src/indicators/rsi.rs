// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// Step 1 — Price deltas from consecutive closes.  The first close has no
//          predecessor; its delta counts as zero gain and zero loss.
// Step 2 — Wilder's exponential smoothing with alpha = 1 / period, seeded
//          with the first (zero) gain / loss:
//            avg_gain = avg_gain * (1 - alpha) + gain * alpha
//            avg_loss = avg_loss * (1 - alpha) + loss * alpha
// Step 3 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// The first `period - 1` positions are warm-up.
// =============================================================================

/// Number of leading warm-up positions for an RSI of `period`.
pub fn warmup(period: usize) -> usize {
    period.saturating_sub(1)
}

/// RSI column aligned with `closes`; warm-up positions are `None`.
///
/// # Edge cases
/// - `period == 0` => every position is `None`
/// - No movement at all (both averages zero) => 50.0
/// - Only gains (average loss zero) => 100.0
/// - Non-finite inputs poison the averages; affected positions are `None`.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; closes.len()];
    }

    let alpha = 1.0 / period as f64;
    let skip = warmup(period);
    let mut avg_gain = 0.0_f64;
    let mut avg_loss = 0.0_f64;

    let mut result = Vec::with_capacity(closes.len());
    for (i, &close) in closes.iter().enumerate() {
        if i > 0 {
            let delta = close - closes[i - 1];
            let gain = if delta > 0.0 { delta } else { 0.0 };
            let loss = if delta < 0.0 { -delta } else { 0.0 };
            avg_gain = avg_gain * (1.0 - alpha) + gain * alpha;
            avg_loss = avg_loss * (1.0 - alpha) + loss * alpha;
        }

        let value = if i >= skip {
            rsi_from_averages(avg_gain, avg_loss)
        } else {
            None
        };
        result.push(value);
    }
    result
}

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// Returns `None` when the result is non-finite.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // flat market
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Some(rsi.clamp(0.0, 100.0))
    } else {
        None
    }
}
