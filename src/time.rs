//! Epoch-millisecond helpers.
//!
//! Expiry instants are stored as milliseconds since the Unix epoch, with `0`
//! meaning "never activated".

use chrono::{DateTime, Months, Utc};

pub const SECOND_MS: i64 = 1_000;
pub const HOUR_MS: i64 = 60 * 60 * SECOND_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Add calendar months to an instant, in UTC.
///
/// A day that does not exist in the target month is clamped to the last day
/// of that month (Jan 31 + 1 month = Feb 28/29). Overflow saturates.
#[must_use]
pub fn add_months(base_ms: i64, months: u32) -> i64 {
    DateTime::<Utc>::from_timestamp_millis(base_ms)
        .and_then(|dt| dt.checked_add_months(Months::new(months)))
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(i64::MAX)
}

/// Format an instant for user-facing messages.
#[must_use]
pub fn format_instant(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}
