//! Paste timestamps are UNIX milliseconds in UTC.

use chrono::{DateTime, Utc};

const MILLIS_PER_SECOND: i64 = 1_000;

pub fn current_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

/// Whole UNIX seconds as a paste timestamp, if chrono can represent the instant.
pub fn from_unix_seconds(seconds: i64) -> Option<i64> {
    seconds
        .checked_mul(MILLIS_PER_SECOND)
        .filter(|millis| is_representable(*millis))
}

pub fn is_representable(millis: i64) -> bool {
    DateTime::from_timestamp_millis(millis).is_some()
}

/// Reads client input written either as UNIX seconds or RFC 3339.
pub fn parse_timestamp(input: &str) -> Result<i64, String> {
    let input = input.trim();
    match input.parse::<i64>() {
        Ok(seconds) => {
            from_unix_seconds(seconds).ok_or_else(|| format!("{seconds} is out of range"))
        }
        Err(_) => DateTime::parse_from_rfc3339(input)
            .map(|parsed| parsed.timestamp_millis())
            .map_err(|_| format!("{input:?} is neither UNIX seconds nor RFC 3339")),
    }
}

pub fn to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}
