// =============================================================================
// Kline payloads — array of positional arrays
// =============================================================================
//
// Layout of one row (exchange REST kline format):
//
//   [0] open time, epoch milliseconds (number or numeric string)
//   [1] open      [2] high      [3] low      [4] close      [5] volume
//   [6..]         ignored (close time, quote volume, trade count, ...)
//
// Prices and volume may be JSON numbers or decimal strings.  A position that
// is past the end of the row or `null` counts as a missing field.
// =============================================================================

use chrono::{TimeZone, Utc};
use serde_json::Value;

use super::{describe, parse_number, FieldTracker, RowOutcome};
use crate::error::{NormalizationError, RowDefect};
use crate::types::Candle;

/// Required positional fields, in row order.
pub const FIELDS: &[&str] = &["open_time", "open", "high", "low", "close", "volume"];

pub(crate) fn parse_rows(
    payload: &Value,
) -> Result<(Vec<RowOutcome>, FieldTracker), NormalizationError> {
    let rows = payload
        .as_array()
        .ok_or_else(|| NormalizationError::UnexpectedShape {
            expected: "klines".to_string(),
            found: describe(payload),
        })?;

    let mut tracker = FieldTracker::new(FIELDS);
    let outcomes = rows
        .iter()
        .enumerate()
        .map(|(index, row)| RowOutcome {
            label: index.to_string(),
            candle: parse_row(row, &mut tracker),
        })
        .collect();

    Ok((outcomes, tracker))
}

fn parse_row(row: &Value, tracker: &mut FieldTracker) -> Result<Candle, RowDefect> {
    let cells = row.as_array().ok_or_else(|| RowDefect::Unparseable {
        field: "row".to_string(),
        raw: row.to_string(),
    })?;

    let cell = |i: usize| cells.get(i).filter(|v| !v.is_null());
    for i in 0..FIELDS.len() {
        if cell(i).is_some() {
            tracker.mark(i);
        }
    }

    let timestamp = parse_open_time(cell(0));
    let open = parse_number(cell(1), FIELDS[1]);
    let high = parse_number(cell(2), FIELDS[2]);
    let low = parse_number(cell(3), FIELDS[3]);
    let close = parse_number(cell(4), FIELDS[4]);
    let volume = parse_number(cell(5), FIELDS[5]);

    Ok(Candle {
        timestamp: timestamp?,
        open: open?,
        high: high?,
        low: low?,
        close: close?,
        volume: volume?,
    })
}

fn parse_open_time(val: Option<&Value>) -> Result<chrono::DateTime<Utc>, RowDefect> {
    let millis = match val {
        None => {
            return Err(RowDefect::Missing {
                field: FIELDS[0].to_string(),
            })
        }
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };

    let raw = || val.map(Value::to_string).unwrap_or_default();
    let millis = millis.ok_or_else(|| RowDefect::BadTimestamp { raw: raw() })?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| RowDefect::BadTimestamp { raw: raw() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_exchange_kline_row() {
        let payload = json!([[
            1700000000000_i64,
            "37000.00",
            "37050.00",
            "36990.00",
            "37020.00",
            "123.456",
            1700000059999_i64,
            "4567890.12",
            1500,
            "60.123",
            "2224455.66",
            "0"
        ]]);
        let (rows, tracker) = parse_rows(&payload).unwrap();
        assert!(tracker.first_absent().is_none());

        let candle = rows[0].candle.clone().unwrap();
        assert_eq!(candle.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert!((candle.close - 37020.0).abs() < f64::EPSILON);
        assert!((candle.volume - 123.456).abs() < 1e-9);
    }

    #[test]
    fn numeric_cells_and_string_time_accepted() {
        let payload = json!([["60000", 1.5, 2.0, 1.0, 1.75, 0]]);
        let (rows, _) = parse_rows(&payload).unwrap();
        let candle = rows[0].candle.clone().unwrap();
        assert_eq!(candle.timestamp.timestamp_millis(), 60_000);
        assert!((candle.close - 1.75).abs() < f64::EPSILON);
    }

    #[test]
    fn object_payload_is_unexpected_shape() {
        let err = parse_rows(&json!({"a": 1})).err().unwrap();
        assert_eq!(
            err,
            NormalizationError::UnexpectedShape {
                expected: "klines".into(),
                found: "an object with 1 keys".into(),
            }
        );
    }

    #[test]
    fn bad_open_time_is_row_defect() {
        let (rows, _) = parse_rows(&json!([["soon", "1", "1", "1", "1", "1"]])).unwrap();
        assert!(matches!(
            rows[0].candle,
            Err(RowDefect::BadTimestamp { .. })
        ));
    }

    #[test]
    fn non_array_row_is_row_defect() {
        let (rows, tracker) = parse_rows(&json!([{"close": 1}])).unwrap();
        assert!(rows[0].candle.is_err());
        assert_eq!(tracker.first_absent(), Some("open_time"));
    }
}
