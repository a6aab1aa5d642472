// =============================================================================
// Signal Desk
// =============================================================================
//
// Normalizes provider OHLCV payloads, derives EMA / RSI / MACD columns and
// reduces them to a BUY / SELL / HOLD verdict.  The core (`market_data`,
// `indicators`, `signals`, `pipeline`) is synchronous and stateless; the
// service layer (`api`, `app_state`, `runtime_config`, `signal_envelope`)
// exposes it over HTTP.
// =============================================================================

pub mod api;
pub mod app_state;
pub mod error;
pub mod indicators;
pub mod market_data;
pub mod pipeline;
pub mod runtime_config;
pub mod signal_envelope;
pub mod signals;
pub mod types;

pub use error::{ConfigError, InsufficientHistory, NormalizationError, RowDefect};
pub use indicators::{IndicatorConfig, IndicatorRow, IndicatorSet};
pub use market_data::{normalize, normalize_str, NormalizationReport, Normalized};
pub use pipeline::{PipelineError, PipelineOutput, PipelineRequest, PipelineStage};
pub use signals::{evaluate, Evaluation, RuleConfig, RuleFamily};
pub use types::{Candle, OhlcvSeries, ProviderShape, SignalVerdict};
