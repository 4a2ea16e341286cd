//! Epoch conversions for browser and system stores.
//!
//! Chromium stores timestamps as microseconds since 1601-01-01 (the
//! Windows FILETIME epoch). Apple stores use CFAbsoluteTime, seconds
//! since 2001-01-01, with newer Messages schemas scaling to nanoseconds.

use chrono::{DateTime, Utc};

/// Milliseconds between 1601-01-01 and 1970-01-01.
pub const CHROME_EPOCH_OFFSET_MS: i64 = 11_644_473_600_000;

/// Seconds between 1970-01-01 and 2001-01-01.
pub const CF_EPOCH_OFFSET_SECS: i64 = 978_307_200;

/// Convert a wall-clock time to Chromium microseconds.
pub fn to_chrome_micros(time: DateTime<Utc>) -> i64 {
    (time.timestamp_millis() + CHROME_EPOCH_OFFSET_MS) * 1000
}

/// Convert Chromium microseconds back to wall-clock time.
///
/// Returns `None` for values before the Unix epoch or out of range.
pub fn from_chrome_micros(micros: i64) -> Option<DateTime<Utc>> {
    let unix_ms = micros / 1000 - CHROME_EPOCH_OFFSET_MS;
    if unix_ms < 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(unix_ms)
}

/// Convert a wall-clock time to CFAbsoluteTime seconds.
pub fn to_cf_seconds(time: DateTime<Utc>) -> i64 {
    time.timestamp() - CF_EPOCH_OFFSET_SECS
}

/// Convert CFAbsoluteTime seconds back to wall-clock time.
pub fn from_cf_seconds(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs + CF_EPOCH_OFFSET_SECS, 0)
}

/// Convert a wall-clock time to Apple epoch nanoseconds (Messages `date`).
pub fn to_apple_nanos(time: DateTime<Utc>) -> i64 {
    to_cf_seconds(time).saturating_mul(1_000_000_000)
}
