//! Column encoding helpers shared by the SQL repositories.
//!
//! Timestamps are stored as RFC 3339 text at microsecond precision so they
//! sort lexicographically on every provider; booleans as 0/1 BIGINT.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use reportflow_core::ReportFlowResult;
use sqlx::any::AnyRow;
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::map_sqlx;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time truncated to what the database round-trips.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

pub fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn fmt_opt_ts(ts: &Option<DateTime<Utc>>) -> Option<String> {
    ts.as_ref().map(fmt_ts)
}

fn decode_err<E>(column: &str, err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(err),
    }
}

pub fn ts(row: &AnyRow, column: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| decode_err(column, e))
}

pub fn opt_ts(row: &AnyRow, column: &str) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|r| {
        DateTime::parse_from_rfc3339(&r)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| decode_err(column, e))
    })
    .transpose()
}

pub fn flag(row: &AnyRow, column: &str) -> Result<bool, sqlx::Error> {
    let raw: i64 = row.try_get(column)?;
    Ok(raw != 0)
}

/// Decode a text column into one of the core text enums.
pub fn text_enum<T>(row: &AnyRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = reportflow_core::ReportFlowError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|e| decode_err(column, e))
}

pub fn json(row: &AnyRow, column: &str) -> Result<serde_json::Value, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    if raw.is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(&raw).map_err(|e| decode_err(column, e))
}

/// Decode every row, failing on the first bad one.
pub fn decode_all<T>(
    rows: &[AnyRow],
    decode: fn(&AnyRow) -> Result<T, sqlx::Error>,
) -> ReportFlowResult<Vec<T>> {
    rows.iter()
        .map(decode)
        .collect::<Result<Vec<T>, sqlx::Error>>()
        .map_err(map_sqlx)
}

pub fn decode_opt<T>(
    row: Option<AnyRow>,
    decode: fn(&AnyRow) -> Result<T, sqlx::Error>,
) -> ReportFlowResult<Option<T>> {
    row.as_ref().map(decode).transpose().map_err(map_sqlx)
}

pub fn count(row: &AnyRow) -> Result<i64, sqlx::Error> {
    row.try_get("count")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_text_sorts_chronologically() {
        let a = now();
        let b = a + chrono::Duration::milliseconds(5);
        assert!(fmt_ts(&a) < fmt_ts(&b));
        assert!(fmt_ts(&a).ends_with('Z'));
    }

    #[test]
    fn test_now_round_trips_through_text() {
        let t = now();
        let parsed = DateTime::parse_from_rfc3339(&fmt_ts(&t))
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parsed, t);
    }
}
