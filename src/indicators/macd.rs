// =============================================================================
// MACD — line, signal and histogram
// =============================================================================
//
//   macd_line   = EMA(close, fast) - EMA(close, slow)
//   signal_line = EMA(macd_line, signal)
//   histogram   = macd_line - signal_line
//
// The line is defined once the slower EMA is (`max(fast, slow) - 1` warm-up).
// The signal EMA is seeded with the first defined line value, so signal and
// histogram add another `signal - 1` warm-up positions on top.
// =============================================================================

use serde::Serialize;

use super::ema::{self, ema_values};

/// The three MACD columns, each aligned with the input closes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdOutput {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// Warm-up of the MACD line.
pub fn line_warmup(fast: usize, slow: usize) -> usize {
    ema::warmup(fast.max(slow))
}

/// Warm-up of the signal line and histogram.
pub fn histogram_warmup(fast: usize, slow: usize, signal: usize) -> usize {
    line_warmup(fast, slow) + ema::warmup(signal)
}

pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdOutput {
    let n = closes.len();
    let undefined = || vec![None; n];
    if fast == 0 || slow == 0 || signal == 0 {
        return MacdOutput {
            line: undefined(),
            signal: undefined(),
            histogram: undefined(),
        };
    }

    let fast_ema = ema_values(closes, fast);
    let slow_ema = ema_values(closes, slow);
    let start = line_warmup(fast, slow);

    let mut line = undefined();
    for i in start..n {
        let v = fast_ema[i] - slow_ema[i];
        line[i] = v.is_finite().then_some(v);
    }

    let mut signal_line = undefined();
    let mut histogram = undefined();
    if start < n {
        let raw_line: Vec<f64> = (start..n).map(|i| fast_ema[i] - slow_ema[i]).collect();
        let skip = ema::warmup(signal);
        for (offset, sig) in ema_values(&raw_line, signal).into_iter().enumerate() {
            if offset < skip || !sig.is_finite() {
                continue;
            }
            let i = start + offset;
            signal_line[i] = Some(sig);
            histogram[i] = line[i].map(|l| l - sig);
        }
    }

    MacdOutput {
        line,
        signal: signal_line,
        histogram,
    }
}
