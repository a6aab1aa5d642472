// =============================================================================
// Signal Evaluator
// =============================================================================
//
// Reduces an enriched series to a single verdict by reading its last two
// fully defined indicator rows and applying the configured rule family.
// Fewer than two defined rows is `InsufficientHistory`, never a silent HOLD.

mod rules;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, InsufficientHistory};
use crate::indicators::{IndicatorRow, IndicatorSet};
use crate::types::{OhlcvSeries, SignalVerdict};

/// Which rule set turns indicator rows into a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleFamily {
    TrendAlignment,
    Crossover,
}

impl Default for RuleFamily {
    fn default() -> Self {
        Self::TrendAlignment
    }
}

impl std::fmt::Display for RuleFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrendAlignment => write!(f, "trend_alignment"),
            Self::Crossover => write!(f, "crossover"),
        }
    }
}

fn default_overbought() -> f64 {
    70.0
}

fn default_oversold() -> f64 {
    30.0
}

fn default_true() -> bool {
    true
}

/// Thresholds and rule family selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub family: RuleFamily,

    /// BUY requires RSI strictly below this.
    #[serde(default = "default_overbought")]
    pub overbought: f64,

    /// SELL requires RSI strictly above this.
    #[serde(default = "default_oversold")]
    pub oversold: f64,

    /// Crossover only: demand a MACD histogram on the side of the cross.
    #[serde(default = "default_true")]
    pub require_macd_confirmation: bool,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            family: RuleFamily::default(),
            overbought: default_overbought(),
            oversold: default_oversold(),
            require_macd_confirmation: true,
        }
    }
}

impl RuleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("overbought", self.overbought), ("oversold", self.oversold)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }
        if self.oversold >= self.overbought {
            return Err(ConfigError::ThresholdsInverted {
                oversold: self.oversold,
                overbought: self.overbought,
            });
        }
        Ok(())
    }
}

/// The verdict plus the two rows it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub verdict: SignalVerdict,
    pub rule: RuleFamily,
    /// Human-readable explanation, suitable for direct display.
    pub reason: String,
    pub previous: IndicatorRow,
    pub latest: IndicatorRow,
}

/// Evaluate the configured rule over the last two defined rows.
pub fn evaluate(
    series: &OhlcvSeries,
    indicators: &IndicatorSet,
    rules: &RuleConfig,
) -> Result<Evaluation, InsufficientHistory> {
    let shortfall = || InsufficientHistory {
        available: series.len(),
        required: indicators.warmup() + 2,
    };

    let (previous, latest) = match indicators.last_defined(2).as_slice() {
        [prev, last] => (
            indicators.row(series, *prev).ok_or_else(shortfall)?,
            indicators.row(series, *last).ok_or_else(shortfall)?,
        ),
        _ => return Err(shortfall()),
    };

    let (verdict, reason) = evaluate_rows(&previous, &latest, rules);

    Ok(Evaluation {
        verdict,
        rule: rules.family,
        reason,
        previous,
        latest,
    })
}

/// Apply the configured rule family to two rows (`previous` then `latest`),
/// returning the verdict and its reason.
pub fn evaluate_rows(
    previous: &IndicatorRow,
    latest: &IndicatorRow,
    rules: &RuleConfig,
) -> (SignalVerdict, String) {
    match rules.family {
        RuleFamily::TrendAlignment => rules::trend_alignment(latest, rules),
        RuleFamily::Crossover => rules::crossover(previous, latest, rules),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::compute;
    use crate::test_support::{series_from_closes, small_config};

    #[test]
    fn default_rules_are_valid() {
        assert!(RuleConfig::default().validate().is_ok());
    }

    #[test]
    fn thresholds_validated() {
        let rules = RuleConfig {
            overbought: 120.0,
            ..RuleConfig::default()
        };
        assert!(matches!(
            rules.validate(),
            Err(ConfigError::ThresholdOutOfRange { name: "overbought", .. })
        ));

        let rules = RuleConfig {
            oversold: 80.0,
            ..RuleConfig::default()
        };
        assert!(matches!(
            rules.validate(),
            Err(ConfigError::ThresholdsInverted { .. })
        ));
    }

    #[test]
    fn rule_config_from_partial_json() {
        let rules: RuleConfig = serde_json::from_str(r#"{"family": "crossover"}"#).unwrap();
        assert_eq!(rules.family, RuleFamily::Crossover);
        assert_eq!(rules.overbought, 70.0);
        assert!(rules.require_macd_confirmation);
    }

    #[test]
    fn one_defined_row_is_insufficient() {
        let cfg = small_config();
        let closes: Vec<f64> = (0..cfg.min_candles_for_row()).map(|i| 10.0 + i as f64).collect();
        let series = series_from_closes(&closes);
        let set = compute(&series, &cfg);

        let err = evaluate(&series, &set, &RuleConfig::default()).unwrap_err();
        assert_eq!(
            err,
            InsufficientHistory {
                available: cfg.min_candles_for_row(),
                required: cfg.min_candles_for_signal(),
            }
        );
    }

    #[test]
    fn reads_only_the_last_two_rows() {
        let cfg = small_config();
        let closes: Vec<f64> = (0..25).map(|i| 100.0 + (i % 5) as f64).collect();
        let series = series_from_closes(&closes);
        let set = compute(&series, &cfg);

        let eval = evaluate(&series, &set, &RuleConfig::default()).unwrap();
        assert_eq!(eval.previous.index, 23);
        assert_eq!(eval.latest.index, 24);
        assert_eq!(
            evaluate_rows(&eval.previous, &eval.latest, &RuleConfig::default()),
            (eval.verdict, eval.reason.clone())
        );
    }

    #[test]
    fn flat_market_holds() {
        let cfg = small_config();
        let series = series_from_closes(&[100.0; 30]);
        let set = compute(&series, &cfg);
        for family in [RuleFamily::TrendAlignment, RuleFamily::Crossover] {
            let rules = RuleConfig {
                family,
                ..RuleConfig::default()
            };
            assert_eq!(evaluate(&series, &set, &rules).unwrap().verdict, SignalVerdict::Hold);
        }
    }
}
