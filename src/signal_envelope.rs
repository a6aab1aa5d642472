// =============================================================================
// Signal Envelope — the record returned for every successful pipeline run
// =============================================================================
//
// Wraps a `PipelineOutput` with an identity and creation time so that the
// dashboard (or any other caller) can refer back to a specific verdict.
// Envelopes are built fresh per request and never stored.
// =============================================================================

use serde::Serialize;

use crate::indicators::IndicatorSet;
use crate::market_data::NormalizationReport;
use crate::pipeline::PipelineOutput;
use crate::signals::Evaluation;
use crate::types::{OhlcvSeries, SignalVerdict};

#[derive(Debug, Clone, Serialize)]
pub struct SignalEnvelope {
    /// Unique identifier for this verdict (UUID v4).
    pub id: String,

    pub instrument: String,

    pub interval: String,

    /// ISO 8601 timestamp of when this envelope was created.
    pub created_at: String,

    /// Final verdict, duplicated from `evaluation` for quick access.
    pub verdict: SignalVerdict,

    /// Human-readable reason for the verdict.
    pub reason: String,

    pub evaluation: Evaluation,

    /// Canonical series the verdict was computed from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<OhlcvSeries>,

    /// Indicator columns aligned with `series`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicators: Option<IndicatorSet>,

    pub report: NormalizationReport,
}

impl SignalEnvelope {
    /// Wrap a finished run.  `include_series` controls whether the (possibly
    /// large) candle and indicator columns travel with the verdict.
    pub fn new(
        instrument: impl Into<String>,
        interval: impl Into<String>,
        output: PipelineOutput,
        include_series: bool,
    ) -> Self {
        let PipelineOutput {
            series,
            indicators,
            evaluation,
            report,
        } = output;

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            instrument: instrument.into(),
            interval: interval.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            verdict: evaluation.verdict,
            reason: evaluation.reason.clone(),
            evaluation,
            series: include_series.then_some(series),
            indicators: include_series.then_some(indicators),
            report,
        }
    }
}
