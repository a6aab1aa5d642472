// =============================================================================
// Core error taxonomy
// =============================================================================
//
// Every failure the core can produce is a typed value.  Row-level defects are
// recovered inside the normalizer (the row is dropped and recorded); series-
// and configuration-level problems travel back to the caller.
// =============================================================================

use serde::Serialize;
use thiserror::Error;

/// What was wrong with a single payload row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "defect", rename_all = "snake_case")]
pub enum RowDefect {
    Missing { field: String },
    Unparseable { field: String, raw: String },
    NonFinite { field: String },
    Negative { field: String },
    BadTimestamp { raw: String },
    DuplicateTimestamp,
}

impl std::fmt::Display for RowDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing { field } => write!(f, "field `{field}` is missing"),
            Self::Unparseable { field, raw } => {
                write!(f, "field `{field}` is not a number: {raw}")
            }
            Self::NonFinite { field } => write!(f, "field `{field}` is not finite"),
            Self::Negative { field } => write!(f, "field `{field}` is negative"),
            Self::BadTimestamp { raw } => write!(f, "unrecognised timestamp: {raw}"),
            Self::DuplicateTimestamp => write!(f, "timestamp superseded by a later row"),
        }
    }
}

/// Failures of the series normalizer.
///
/// `MalformedRow` never aborts a run: it is the record kept in the
/// normalization report for each dropped row.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum NormalizationError {
    #[error("payload contains no usable rows")]
    EmptyPayload,

    #[error("required field `{0}` is absent from every row")]
    MissingField(String),

    #[error("row {row} dropped: {defect}")]
    MalformedRow { row: String, defect: RowDefect },

    #[error("payload does not match the {expected} shape: {found}")]
    UnexpectedShape { expected: String, found: String },
}

/// Rejected indicator or rule configuration.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigError {
    #[error("window `{name}` must be greater than zero")]
    ZeroWindow { name: &'static str },

    #[error("`{fast}` ({fast_value}) must be smaller than `{slow}` ({slow_value})")]
    FastNotBelowSlow {
        fast: &'static str,
        fast_value: usize,
        slow: &'static str,
        slow_value: usize,
    },

    #[error("threshold `{name}` = {value} is outside [0, 100]")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("oversold ({oversold}) must be below overbought ({overbought})")]
    ThresholdsInverted { oversold: f64, overbought: f64 },

    #[error("`{name}` ({value}) is below the {required} candles a verdict needs")]
    LookbackBelowWarmup {
        name: &'static str,
        value: usize,
        required: usize,
    },

    #[error("default_lookback ({default_lookback}) exceeds max_lookback ({max_lookback})")]
    LookbackAboveMax {
        default_lookback: usize,
        max_lookback: usize,
    },
}

/// Not enough candles to produce two fully defined indicator rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[error("not enough data: {available} candles available, {required} required")]
pub struct InsufficientHistory {
    pub available: usize,
    pub required: usize,
}
