// =============================================================================
// Rule bodies
// =============================================================================
//
// Each rule sees exactly two fully defined rows: `previous` (index -2) and
// `latest` (index -1).  Nothing older is reachable from here.
//
// Trend alignment:
//   BUY  iff close > ema_fast > ema_slow  and rsi < overbought
//   SELL iff close < ema_fast < ema_slow  and rsi > oversold
//
// Crossover:
//   BUY  iff ema_fast crossed above ema_slow on the latest candle,
//        rsi < overbought and (if confirmation is on) macd_hist > 0
//   SELL iff ema_fast crossed below ema_slow on the latest candle,
//        rsi > oversold and (if confirmation is on) macd_hist < 0
//
// All comparisons are strict: RSI exactly at a threshold does not qualify.
// =============================================================================

use super::RuleConfig;
use crate::indicators::IndicatorRow;
use crate::types::SignalVerdict;

pub(crate) fn trend_alignment(
    latest: &IndicatorRow,
    rules: &RuleConfig,
) -> (SignalVerdict, String) {
    let bullish_stack = latest.close > latest.ema_fast && latest.ema_fast > latest.ema_slow;
    let bearish_stack = latest.close < latest.ema_fast && latest.ema_fast < latest.ema_slow;

    if bullish_stack && latest.rsi < rules.overbought {
        return (
            SignalVerdict::Buy,
            format!(
                "close {:.4} > fast EMA {:.4} > slow EMA {:.4}, RSI {:.2} below {}",
                latest.close, latest.ema_fast, latest.ema_slow, latest.rsi, rules.overbought
            ),
        );
    }
    if bearish_stack && latest.rsi > rules.oversold {
        return (
            SignalVerdict::Sell,
            format!(
                "close {:.4} < fast EMA {:.4} < slow EMA {:.4}, RSI {:.2} above {}",
                latest.close, latest.ema_fast, latest.ema_slow, latest.rsi, rules.oversold
            ),
        );
    }

    let reason = if bullish_stack {
        format!("bullish stack but RSI {:.2} is overbought", latest.rsi)
    } else if bearish_stack {
        format!("bearish stack but RSI {:.2} is oversold", latest.rsi)
    } else {
        "price and EMAs are not aligned".to_string()
    };
    (SignalVerdict::Hold, reason)
}

pub(crate) fn crossover(
    previous: &IndicatorRow,
    latest: &IndicatorRow,
    rules: &RuleConfig,
) -> (SignalVerdict, String) {
    let crossed_up = previous.ema_fast <= previous.ema_slow && latest.ema_fast > latest.ema_slow;
    let crossed_down = previous.ema_fast >= previous.ema_slow && latest.ema_fast < latest.ema_slow;

    if crossed_up {
        if latest.rsi >= rules.overbought {
            return (
                SignalVerdict::Hold,
                format!("upward cross blocked: RSI {:.2} is overbought", latest.rsi),
            );
        }
        if rules.require_macd_confirmation && latest.macd_hist <= 0.0 {
            return (
                SignalVerdict::Hold,
                format!(
                    "upward cross not confirmed: MACD histogram {:.6}",
                    latest.macd_hist
                ),
            );
        }
        return (
            SignalVerdict::Buy,
            format!(
                "fast EMA crossed above slow EMA ({:.4} > {:.4}), RSI {:.2}",
                latest.ema_fast, latest.ema_slow, latest.rsi
            ),
        );
    }

    if crossed_down {
        if latest.rsi <= rules.oversold {
            return (
                SignalVerdict::Hold,
                format!("downward cross blocked: RSI {:.2} is oversold", latest.rsi),
            );
        }
        if rules.require_macd_confirmation && latest.macd_hist >= 0.0 {
            return (
                SignalVerdict::Hold,
                format!(
                    "downward cross not confirmed: MACD histogram {:.6}",
                    latest.macd_hist
                ),
            );
        }
        return (
            SignalVerdict::Sell,
            format!(
                "fast EMA crossed below slow EMA ({:.4} < {:.4}), RSI {:.2}",
                latest.ema_fast, latest.ema_slow, latest.rsi
            ),
        );
    }

    (SignalVerdict::Hold, "no EMA cross on the latest candle".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::RuleFamily;

    fn row(index: usize, close: f64, fast: f64, slow: f64, rsi: f64, hist: f64) -> IndicatorRow {
        IndicatorRow {
            index,
            close,
            ema_fast: fast,
            ema_slow: slow,
            rsi,
            macd_hist: hist,
        }
    }

    fn crossover_rules() -> RuleConfig {
        RuleConfig {
            family: RuleFamily::Crossover,
            ..RuleConfig::default()
        }
    }

    // ---- trend_alignment --------------------------------------------------

    #[test]
    fn trend_buy_and_sell() {
        let rules = RuleConfig::default();
        let up = row(1, 105.0, 104.0, 103.0, 60.0, 0.0);
        assert_eq!(trend_alignment(&up, &rules).0, SignalVerdict::Buy);

        let down = row(1, 95.0, 96.0, 97.0, 40.0, 0.0);
        assert_eq!(trend_alignment(&down, &rules).0, SignalVerdict::Sell);
    }

    #[test]
    fn trend_rsi_exactly_at_threshold_holds() {
        let rules = RuleConfig::default();
        let up = row(1, 105.0, 104.0, 103.0, 70.0, 0.0);
        assert_eq!(trend_alignment(&up, &rules).0, SignalVerdict::Hold);

        let down = row(1, 95.0, 96.0, 97.0, 30.0, 0.0);
        assert_eq!(trend_alignment(&down, &rules).0, SignalVerdict::Hold);
    }

    #[test]
    fn trend_mixed_stack_holds() {
        let rules = RuleConfig::default();
        let mixed = row(1, 105.0, 103.0, 104.0, 50.0, 0.0);
        let (verdict, reason) = trend_alignment(&mixed, &rules);
        assert_eq!(verdict, SignalVerdict::Hold);
        assert_eq!(reason, "price and EMAs are not aligned");
    }

    // ---- crossover ----------------------------------------------------------

    #[test]
    fn upward_cross_buys() {
        let rules = crossover_rules();
        let prev = row(0, 100.0, 99.0, 99.5, 55.0, -0.1);
        let last = row(1, 102.0, 100.0, 99.8, 60.0, 0.2);
        assert_eq!(crossover(&prev, &last, &rules).0, SignalVerdict::Buy);
    }

    #[test]
    fn touching_then_crossing_counts() {
        let rules = crossover_rules();
        let prev = row(0, 100.0, 99.5, 99.5, 55.0, 0.0);
        let last = row(1, 102.0, 100.0, 99.8, 60.0, 0.2);
        assert_eq!(crossover(&prev, &last, &rules).0, SignalVerdict::Buy);
    }

    #[test]
    fn reversing_the_rows_flips_the_cross() {
        let rules = crossover_rules();
        let a = row(0, 100.0, 99.0, 99.5, 55.0, -0.1);
        let b = row(1, 102.0, 100.0, 99.8, 60.0, 0.2);
        assert_eq!(crossover(&a, &b, &rules).0, SignalVerdict::Buy);

        // Same two rows, reversed: the cross is now downward, and `a` has a
        // negative histogram with RSI above oversold.
        assert_eq!(crossover(&b, &a, &rules).0, SignalVerdict::Sell);
    }

    #[test]
    fn reversed_cross_without_confirmation_holds() {
        let rules = crossover_rules();
        let a = row(0, 100.0, 99.0, 99.5, 55.0, 0.3);
        let b = row(1, 102.0, 100.0, 99.8, 60.0, 0.2);
        assert_eq!(crossover(&a, &b, &rules).0, SignalVerdict::Buy);
        assert_eq!(crossover(&b, &a, &rules).0, SignalVerdict::Hold);
    }

    #[test]
    fn cross_blocked_by_rsi_boundary() {
        let rules = crossover_rules();
        let prev = row(0, 100.0, 99.0, 99.5, 55.0, -0.1);
        let last = row(1, 102.0, 100.0, 99.8, 70.0, 0.2);
        assert_eq!(crossover(&prev, &last, &rules).0, SignalVerdict::Hold);

        let just_below = row(1, 102.0, 100.0, 99.8, 69.999, 0.2);
        assert_eq!(crossover(&prev, &just_below, &rules).0, SignalVerdict::Buy);
    }

    #[test]
    fn macd_confirmation_can_be_disabled() {
        let prev = row(0, 100.0, 99.0, 99.5, 55.0, -0.3);
        let last = row(1, 102.0, 100.0, 99.8, 60.0, -0.1);
        assert_eq!(crossover(&prev, &last, &crossover_rules()).0, SignalVerdict::Hold);

        let lenient = RuleConfig {
            require_macd_confirmation: false,
            ..crossover_rules()
        };
        assert_eq!(crossover(&prev, &last, &lenient).0, SignalVerdict::Buy);
    }

    #[test]
    fn no_cross_holds() {
        let rules = crossover_rules();
        let prev = row(0, 100.0, 101.0, 99.0, 55.0, 0.1);
        let last = row(1, 102.0, 102.0, 99.5, 60.0, 0.2);
        assert_eq!(crossover(&prev, &last, &rules).0, SignalVerdict::Hold);
    }
}
