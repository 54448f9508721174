//! Wire and storage formats for instants.
//!
//! Everything is stored as UTC `YYYY-MM-DD HH:MM:SS`. Inputs may also be a bare
//! `YYYY-MM-DD`, which is read as midnight UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serializer;
use thiserror::Error;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timestamp '{0}', expected YYYY-MM-DD HH:MM:SS or YYYY-MM-DD")]
pub struct TimestampParseError(pub String);

/// Parse either accepted format into a UTC instant.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, TimestampParseError> {
    let input = input.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, DATETIME_FORMAT) {
        return Ok(dt.and_utc());
    }
    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| TimestampParseError(input.to_string()))
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(DATETIME_FORMAT).to_string()
}

/// `serialize_with` helper emitting the `YYYY-MM-DD HH:MM:SS` form.
pub fn serialize_timestamp<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(*at))
}

pub fn serialize_optional_timestamp<S: Serializer>(
    at: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match at {
        Some(at) => serialize_timestamp(at, serializer),
        None => serializer.serialize_none(),
    }
}

/// Drop sub-second precision so an instant survives a round trip through storage unchanged.
pub fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}
