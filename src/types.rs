// =============================================================================
// Shared types used across the signal pipeline
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV time bucket.
///
/// Prices and volume are finite and non-negative.  `high`/`low` consistency
/// is *not* enforced: providers occasionally ship bars where `high` is below
/// the close, and those are kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// `true` when high/low actually bracket the open and close.
    pub fn has_consistent_range(&self) -> bool {
        self.high >= self.open.max(self.close) && self.low <= self.open.min(self.close)
    }
}

/// Canonical candle series: strictly increasing timestamps, no duplicates.
///
/// Only the normalizer builds one from raw rows; afterwards the series is
/// read-only.  Derived indicator columns live beside it, never inside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OhlcvSeries {
    candles: Vec<Candle>,
}

impl OhlcvSeries {
    /// Build a series from candles that are already sorted and de-duplicated.
    pub(crate) fn from_ordered(candles: Vec<Candle>) -> Self {
        debug_assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        Self { candles }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// Close prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Keep only the most recent `count` candles (oldest-first order).
    pub fn tail(&self, count: usize) -> Self {
        let start = self.candles.len().saturating_sub(count);
        Self {
            candles: self.candles[start..].to_vec(),
        }
    }
}

/// The closed set of upstream payload layouts the normalizer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderShape {
    /// Array of positional arrays: `[open_time_ms, open, high, low, close, volume, ...]`.
    Klines,
    /// Object keyed by timestamp string holding `"1. open"` .. `"5. volume"`.
    TimeSeries,
}

impl std::fmt::Display for ProviderShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Klines => write!(f, "klines"),
            Self::TimeSeries => write!(f, "time_series"),
        }
    }
}

/// Discrete trading signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalVerdict {
    Buy,
    Sell,
    Hold,
}

impl Default for SignalVerdict {
    fn default() -> Self {
        Self::Hold
    }
}

impl std::fmt::Display for SignalVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}
