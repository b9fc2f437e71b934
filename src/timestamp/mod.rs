use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timestamp {raw:?}: expected ISO-8601")]
pub struct TimestampError {
    pub raw: String,
}

/// Parses an ISO-8601 timestamp as emitted by the assignment source.
///
/// Offsets are honoured; naive date-times and bare dates are read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TimestampError {
            raw: raw.to_string(),
        })
}

/// Like [`parse_timestamp`], but a missing or blank value means "not set".
pub fn parse_optional_timestamp(
    raw: Option<&str>,
) -> Result<Option<DateTime<Utc>>, TimestampError> {
    match raw {
        Some(value) if !value.trim().is_empty() => parse_timestamp(value).map(Some),
        _ => Ok(None),
    }
}
