// =============================================================================
// Pipeline Orchestrator
// =============================================================================
//
// One run per (instrument, interval) request:
//
//   Raw ──normalize──▶ Normalized ──compute──▶ Enriched ──evaluate──▶ Evaluated ──▶ Done
//
// Any stage may short-circuit to a typed `PipelineError`.  Runs are
// synchronous, hold no shared state and never retry; a retry is the caller
// invoking `run` again with a fresh payload.
// =============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{ConfigError, InsufficientHistory, NormalizationError};
use crate::indicators::{self, IndicatorConfig, IndicatorSet};
use crate::market_data::{self, NormalizationReport};
use crate::signals::{self, Evaluation, RuleConfig};
use crate::types::{OhlcvSeries, ProviderShape};

/// Interval labels the dashboard offers.  Others are accepted with a warning.
pub const KNOWN_INTERVALS: &[&str] = &["1m", "5m", "15m", "30m", "1h", "4h", "1d"];

// ---------------------------------------------------------------------------
// Stages and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Raw,
    Normalized,
    Enriched,
    Evaluated,
    Done,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Normalized => write!(f, "normalized"),
            Self::Enriched => write!(f, "enriched"),
            Self::Evaluated => write!(f, "evaluated"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Why a run stopped.  `Display` is the human-readable reason.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error("could not read market data: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("{0}")]
    InsufficientHistory(#[from] InsufficientHistory),
}

impl PipelineError {
    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::Normalization(_) => "normalization",
            Self::InsufficientHistory(_) => "insufficient_history",
        }
    }

    /// Stage at which the run stopped.
    pub fn failed_at(&self) -> PipelineStage {
        match self {
            Self::InvalidConfiguration(_) | Self::Normalization(_) => PipelineStage::Raw,
            Self::InsufficientHistory(_) => PipelineStage::Enriched,
        }
    }
}

// ---------------------------------------------------------------------------
// Request / output
// ---------------------------------------------------------------------------

/// Everything one run needs.  The core reads no other configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineRequest {
    pub instrument: String,
    pub interval: String,
    /// Keep only the most recent `lookback` candles after normalization.
    pub lookback: Option<usize>,
    pub shape: ProviderShape,
    pub payload: Value,
    pub indicators: IndicatorConfig,
    pub rules: RuleConfig,
}

/// A finished run: canonical series, aligned indicators and the verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub series: OhlcvSeries,
    pub indicators: IndicatorSet,
    pub evaluation: Evaluation,
    pub report: NormalizationReport,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run the whole pipeline on one raw payload.
pub fn run(
    payload: &Value,
    shape: ProviderShape,
    indicator_config: &IndicatorConfig,
    rule_config: &RuleConfig,
) -> Result<PipelineOutput, PipelineError> {
    run_with_lookback(payload, shape, None, indicator_config, rule_config)
}

/// Run a full request, tagging log output with the instrument and interval.
pub fn run_request(request: &PipelineRequest) -> Result<PipelineOutput, PipelineError> {
    let span = tracing::debug_span!(
        "pipeline",
        instrument = %request.instrument,
        interval = %request.interval
    );
    let _guard = span.enter();

    if !KNOWN_INTERVALS.contains(&request.interval.as_str()) {
        warn!(interval = %request.interval, "unrecognised interval label -- running anyway");
    }

    let result = run_with_lookback(
        &request.payload,
        request.shape,
        request.lookback,
        &request.indicators,
        &request.rules,
    );
    if let Err(e) = &result {
        warn!(kind = e.kind(), stage = %e.failed_at(), reason = %e, "pipeline run failed");
    }
    result
}

fn run_with_lookback(
    payload: &Value,
    shape: ProviderShape,
    lookback: Option<usize>,
    indicator_config: &IndicatorConfig,
    rule_config: &RuleConfig,
) -> Result<PipelineOutput, PipelineError> {
    indicator_config.validate()?;
    rule_config.validate()?;
    debug!(stage = %PipelineStage::Raw, shape = %shape, "configuration accepted");

    let normalized = market_data::normalize(payload, shape)?;
    let series = match lookback {
        Some(count) => normalized.series.tail(count),
        None => normalized.series,
    };
    debug!(stage = %PipelineStage::Normalized, candles = series.len(), "series ready");

    let enriched = indicators::compute(&series, indicator_config);
    if let Err(shortfall) = enriched.check_history() {
        debug!(
            available = shortfall.available,
            required = shortfall.required,
            "indicator warm-up not satisfied"
        );
    }
    debug!(
        stage = %PipelineStage::Enriched,
        defined_rows = enriched.defined_rows(),
        "indicators computed"
    );

    // The evaluator has the final word on history; both shortfalls surface
    // as the same `InsufficientHistory`.
    let evaluation = signals::evaluate(&series, &enriched, rule_config)?;
    debug!(
        stage = %PipelineStage::Evaluated,
        verdict = %evaluation.verdict,
        rule = %evaluation.rule,
        "verdict reached"
    );

    let output = PipelineOutput {
        series,
        indicators: enriched,
        evaluation,
        report: normalized.report,
    };
    debug!(stage = %PipelineStage::Done, "pipeline finished");
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
