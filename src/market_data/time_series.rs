// =============================================================================
// Time-series payloads — object keyed by timestamp string
// =============================================================================
//
// Layout (FX / equity daily & intraday records):
//
//   {
//     "2024-03-01 10:00:00": {
//       "1. open": "1.0812", "2. high": "1.0820",
//       "3. low":  "1.0801", "4. close": "1.0815",
//       "5. volume": "1200"          <- optional, FX series carry none
//     },
//     ...
//   }
//
// Keys are `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`, read as UTC.  Records are
// visited in payload order (serde_json `preserve_order`), so ordering and
// duplicate resolution see the provider's sequence.  The complete
// provider response is accepted too: an object holding a `"Time Series ..."`
// key whose value is the map above (sibling keys like `"Meta Data"` are
// ignored).
// =============================================================================

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use super::{describe, parse_number, FieldTracker, RowOutcome};
use crate::error::{NormalizationError, RowDefect};
use crate::types::Candle;

/// Required labeled fields.
pub const FIELDS: &[&str] = &["1. open", "2. high", "3. low", "4. close"];

/// Optional volume field; absent means 0.0.
pub const VOLUME_FIELD: &str = "5. volume";

const SERIES_KEY_PREFIX: &str = "Time Series";

/// Keys a provider uses to report a refused request instead of data.
const NOTICE_KEYS: &[&str] = &["Error Message", "Note", "Information"];

pub(crate) fn parse_rows(
    payload: &Value,
) -> Result<(Vec<RowOutcome>, FieldTracker), NormalizationError> {
    let records = locate_records(payload)?;

    let mut tracker = FieldTracker::new(FIELDS);
    let outcomes = records
        .iter()
        .map(|(key, record)| RowOutcome {
            label: key.clone(),
            candle: parse_record(key, record, &mut tracker),
        })
        .collect();

    Ok((outcomes, tracker))
}

/// Find the timestamp-keyed map, unwrapping the provider envelope if present.
fn locate_records(payload: &Value) -> Result<&Map<String, Value>, NormalizationError> {
    let unexpected = |found: String| NormalizationError::UnexpectedShape {
        expected: "time_series".to_string(),
        found,
    };

    let root = payload
        .as_object()
        .ok_or_else(|| unexpected(describe(payload)))?;

    if let Some(series) = root
        .iter()
        .find(|(key, _)| key.starts_with(SERIES_KEY_PREFIX))
        .map(|(_, value)| value)
    {
        return series
            .as_object()
            .ok_or_else(|| unexpected(format!("series entry is {}", describe(series))));
    }

    if let Some(notice) = NOTICE_KEYS.iter().find_map(|k| root.get(*k)) {
        let text = notice
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| notice.to_string());
        return Err(unexpected(format!("provider notice: {text}")));
    }

    Ok(root)
}

fn parse_record(
    key: &str,
    record: &Value,
    tracker: &mut FieldTracker,
) -> Result<Candle, RowDefect> {
    let fields = record.as_object().ok_or_else(|| RowDefect::Unparseable {
        field: "record".to_string(),
        raw: record.to_string(),
    })?;

    for (i, name) in FIELDS.iter().enumerate() {
        if fields.get(*name).is_some_and(|v| !v.is_null()) {
            tracker.mark(i);
        }
    }

    let timestamp = parse_timestamp(key);
    let open = parse_number(fields.get(FIELDS[0]), FIELDS[0]);
    let high = parse_number(fields.get(FIELDS[1]), FIELDS[1]);
    let low = parse_number(fields.get(FIELDS[2]), FIELDS[2]);
    let close = parse_number(fields.get(FIELDS[3]), FIELDS[3]);
    let volume = match fields.get(VOLUME_FIELD) {
        None | Some(Value::Null) => Ok(0.0),
        present => parse_number(present, VOLUME_FIELD),
    };

    Ok(Candle {
        timestamp: timestamp?,
        open: open?,
        high: high?,
        low: low?,
        close: close?,
        volume: volume?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RowDefect> {
    let trimmed = raw.trim();
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| RowDefect::BadTimestamp {
            raw: raw.to_string(),
        })?;
    Ok(Utc.from_utc_datetime(&naive))
}
