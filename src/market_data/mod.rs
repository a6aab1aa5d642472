// =============================================================================
// Series Normalizer
// =============================================================================
//
// Turns a raw provider payload into a canonical `OhlcvSeries`.
//
// Each `ProviderShape` has its own row parser (see `klines` and
// `time_series` for the exact field layout).  The shared steps are:
//
//   1. Parse every row independently; a row with any defect is dropped and
//      recorded in the report instead of being coerced.
//   2. Fail with `MissingField` when a required field is absent from every
//      row (a structural mismatch, not occasional bad rows).
//   3. Collapse duplicate timestamps (last occurrence wins) and sort
//      ascending.
//   4. Fail with `EmptyPayload` when nothing survives.
//
// The transform is pure: identical input yields an identical series.
// =============================================================================

pub mod klines;
pub mod time_series;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{NormalizationError, RowDefect};
use crate::types::{Candle, OhlcvSeries, ProviderShape};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// What happened to the payload on its way to a canonical series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizationReport {
    pub shape: ProviderShape,
    pub rows_received: usize,
    pub rows_accepted: usize,
    /// One `MalformedRow` per dropped row, in payload order.
    pub skipped: Vec<NormalizationError>,
    /// `true` when the payload rows were not already in ascending order.
    pub reordered: bool,
    /// Accepted candles whose high/low do not bracket open and close.
    pub inconsistent_ranges: usize,
}

/// A canonical series together with its normalization report.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub series: OhlcvSeries,
    pub report: NormalizationReport,
}

// ---------------------------------------------------------------------------
// Parser plumbing shared by the shape-specific modules
// ---------------------------------------------------------------------------

/// Result of parsing a single payload row.
pub(crate) struct RowOutcome {
    /// Row label used in reports: the index for klines, the key for time series.
    pub label: String,
    pub candle: Result<Candle, RowDefect>,
}

/// Records which required fields were seen in at least one row.
pub(crate) struct FieldTracker {
    fields: &'static [&'static str],
    seen: Vec<bool>,
}

impl FieldTracker {
    pub fn new(fields: &'static [&'static str]) -> Self {
        Self {
            fields,
            seen: vec![false; fields.len()],
        }
    }

    pub fn mark(&mut self, index: usize) {
        if let Some(slot) = self.seen.get_mut(index) {
            *slot = true;
        }
    }

    /// First required field that no row carried.
    pub fn first_absent(&self) -> Option<&'static str> {
        self.fields
            .iter()
            .zip(&self.seen)
            .find(|(_, seen)| !**seen)
            .map(|(name, _)| *name)
    }
}

/// Parse a price/volume cell.  Providers send numbers either as JSON numbers
/// or as decimal strings.
pub(crate) fn parse_number(val: Option<&Value>, field: &str) -> Result<f64, RowDefect> {
    let value = match val {
        None | Some(Value::Null) => {
            return Err(RowDefect::Missing {
                field: field.to_string(),
            })
        }
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| RowDefect::Unparseable {
            field: field.to_string(),
            raw: n.to_string(),
        })?,
        Some(Value::String(s)) => {
            s.trim()
                .parse::<f64>()
                .map_err(|_| RowDefect::Unparseable {
                    field: field.to_string(),
                    raw: s.clone(),
                })?
        }
        Some(other) => {
            return Err(RowDefect::Unparseable {
                field: field.to_string(),
                raw: other.to_string(),
            })
        }
    };

    if !value.is_finite() {
        return Err(RowDefect::NonFinite {
            field: field.to_string(),
        });
    }
    if value < 0.0 {
        return Err(RowDefect::Negative {
            field: field.to_string(),
        });
    }
    Ok(value)
}

/// Short description of a JSON value's type for `UnexpectedShape` errors.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(_) => "a number".to_string(),
        Value::String(_) => "a string".to_string(),
        Value::Array(a) => format!("an array of {} elements", a.len()),
        Value::Object(o) => format!("an object with {} keys", o.len()),
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Normalize an already-decoded JSON payload of the given shape.
pub fn normalize(payload: &Value, shape: ProviderShape) -> Result<Normalized, NormalizationError> {
    let (rows, tracker) = match shape {
        ProviderShape::Klines => klines::parse_rows(payload)?,
        ProviderShape::TimeSeries => time_series::parse_rows(payload)?,
    };

    if rows.is_empty() {
        return Err(NormalizationError::EmptyPayload);
    }
    if let Some(field) = tracker.first_absent() {
        return Err(NormalizationError::MissingField(field.to_string()));
    }

    let rows_received = rows.len();
    let mut skipped = Vec::new();
    let mut accepted: Vec<(String, Candle)> = Vec::with_capacity(rows_received);

    for RowOutcome { label, candle } in rows {
        match candle {
            Ok(candle) => accepted.push((label, candle)),
            Err(defect) => {
                debug!(row = %label, defect = %defect, "dropping malformed row");
                skipped.push(NormalizationError::MalformedRow { row: label, defect });
            }
        }
    }

    let reordered = !accepted
        .windows(2)
        .all(|w| w[0].1.timestamp <= w[1].1.timestamp);

    // Last occurrence of a timestamp wins; the BTreeMap also sorts.
    let mut by_time: BTreeMap<DateTime<Utc>, (String, Candle)> = BTreeMap::new();
    for (label, candle) in accepted {
        if let Some((previous, _)) = by_time.insert(candle.timestamp, (label, candle)) {
            debug!(row = %previous, "dropping superseded duplicate timestamp");
            skipped.push(NormalizationError::MalformedRow {
                row: previous,
                defect: RowDefect::DuplicateTimestamp,
            });
        }
    }

    if by_time.is_empty() {
        return Err(NormalizationError::EmptyPayload);
    }

    let candles: Vec<Candle> = by_time.into_values().map(|(_, c)| c).collect();
    let inconsistent_ranges = candles.iter().filter(|c| !c.has_consistent_range()).count();

    let report = NormalizationReport {
        shape,
        rows_received,
        rows_accepted: candles.len(),
        skipped,
        reordered,
        inconsistent_ranges,
    };

    debug!(
        shape = %shape,
        received = report.rows_received,
        accepted = report.rows_accepted,
        skipped = report.skipped.len(),
        inconsistent = report.inconsistent_ranges,
        "payload normalized"
    );

    Ok(Normalized {
        series: OhlcvSeries::from_ordered(candles),
        report,
    })
}

/// Normalize raw payload text.  Text that is not JSON fails with
/// `UnexpectedShape`.
pub fn normalize_str(text: &str, shape: ProviderShape) -> Result<Normalized, NormalizationError> {
    let payload: Value =
        serde_json::from_str(text).map_err(|e| NormalizationError::UnexpectedShape {
            expected: shape.to_string(),
            found: format!("invalid JSON ({e})"),
        })?;
    normalize(&payload, shape)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
