// =============================================================================
// Indicator Engine
// =============================================================================
//
// Derives EMA / RSI / MACD columns from a canonical series.  Every column is
// aligned index-for-index with the series and uses `None` for warm-up
// positions.  The engine never refuses a short series: it just returns more
// warm-up.  Whether that is fatal is the caller's decision
// (`IndicatorSet::check_history`).

pub mod ema;
pub mod macd;
pub mod rsi;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, InsufficientHistory};
use crate::types::OhlcvSeries;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn default_ema_fast() -> usize {
    20
}

fn default_ema_slow() -> usize {
    50
}

fn default_rsi_window() -> usize {
    14
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

/// Indicator windows.  Every field has a serde default so partial JSON works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_ema_fast")]
    pub ema_fast_window: usize,
    #[serde(default = "default_ema_slow")]
    pub ema_slow_window: usize,
    #[serde(default = "default_rsi_window")]
    pub rsi_window: usize,
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_fast_window: default_ema_fast(),
            ema_slow_window: default_ema_slow(),
            rsi_window: default_rsi_window(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let windows = [
            ("ema_fast_window", self.ema_fast_window),
            ("ema_slow_window", self.ema_slow_window),
            ("rsi_window", self.rsi_window),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
        ];
        if let Some(&(name, _)) = windows.iter().find(|(_, w)| *w == 0) {
            return Err(ConfigError::ZeroWindow { name });
        }

        let pairs = [
            ("ema_fast_window", self.ema_fast_window, "ema_slow_window", self.ema_slow_window),
            ("macd_fast", self.macd_fast, "macd_slow", self.macd_slow),
        ];
        for (fast, fast_value, slow, slow_value) in pairs {
            if fast_value >= slow_value {
                return Err(ConfigError::FastNotBelowSlow {
                    fast,
                    fast_value,
                    slow,
                    slow_value,
                });
            }
        }
        Ok(())
    }

    /// Largest warm-up across all columns.
    pub fn warmup(&self) -> usize {
        [
            ema::warmup(self.ema_fast_window),
            ema::warmup(self.ema_slow_window),
            rsi::warmup(self.rsi_window),
            macd::histogram_warmup(self.macd_fast, self.macd_slow, self.macd_signal),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Candles needed for one fully defined row.
    pub fn min_candles_for_row(&self) -> usize {
        self.warmup() + 1
    }

    /// Candles needed for two fully defined rows (what a verdict reads).
    pub fn min_candles_for_signal(&self) -> usize {
        self.warmup() + 2
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Derived columns, aligned with the series they were computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub ema_fast: Vec<Option<f64>>,
    pub ema_slow: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub macd_line: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub macd_hist: Vec<Option<f64>>,
    warmup: usize,
}

/// One fully defined row: the candle close plus every indicator value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorRow {
    pub index: usize,
    pub close: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub macd_hist: f64,
}

impl IndicatorSet {
    pub fn len(&self) -> usize {
        self.ema_fast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ema_fast.is_empty()
    }

    /// Largest configured warm-up of the columns in this set.
    pub fn warmup(&self) -> usize {
        self.warmup
    }

    /// Row `index` if every column is defined there.
    pub fn row(&self, series: &OhlcvSeries, index: usize) -> Option<IndicatorRow> {
        Some(IndicatorRow {
            index,
            close: series.candles().get(index)?.close,
            ema_fast: (*self.ema_fast.get(index)?)?,
            ema_slow: (*self.ema_slow.get(index)?)?,
            rsi: (*self.rsi.get(index)?)?,
            macd_hist: (*self.macd_hist.get(index)?)?,
        })
    }

    pub fn is_row_defined(&self, index: usize) -> bool {
        [
            &self.ema_fast,
            &self.ema_slow,
            &self.rsi,
            &self.macd_line,
            &self.macd_signal,
            &self.macd_hist,
        ]
        .iter()
        .all(|col| matches!(col.get(index), Some(Some(_))))
    }

    /// Number of fully defined rows.
    pub fn defined_rows(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_row_defined(i)).count()
    }

    /// Indices of the last `count` fully defined rows, oldest first.
    pub fn last_defined(&self, count: usize) -> Vec<usize> {
        let mut found: Vec<usize> = (0..self.len())
            .rev()
            .filter(|&i| self.is_row_defined(i))
            .take(count)
            .collect();
        found.reverse();
        found
    }

    /// Report whether there is enough history for a two-row verdict.
    pub fn check_history(&self) -> Result<(), InsufficientHistory> {
        let required = self.warmup + 2;
        if self.len() < required {
            return Err(InsufficientHistory {
                available: self.len(),
                required,
            });
        }
        Ok(())
    }
}

/// Compute every indicator column over the series' closes.
pub fn compute(series: &OhlcvSeries, config: &IndicatorConfig) -> IndicatorSet {
    let closes = series.closes();
    let macd = macd::calculate_macd(&closes, config.macd_fast, config.macd_slow, config.macd_signal);

    IndicatorSet {
        ema_fast: ema::calculate_ema(&closes, config.ema_fast_window),
        ema_slow: ema::calculate_ema(&closes, config.ema_slow_window),
        rsi: rsi::calculate_rsi(&closes, config.rsi_window),
        macd_line: macd.line,
        macd_signal: macd.signal,
        macd_hist: macd.histogram,
        warmup: config.warmup(),
    }
}
