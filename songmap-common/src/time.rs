//! Timestamp utilities

use chrono::Utc;

/// Current time as milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert hours to milliseconds, saturating at `i64::MAX`
pub fn hours_to_millis(hours: u64) -> i64 {
    i64::try_from(hours)
        .unwrap_or(i64::MAX)
        .saturating_mul(60 * 60 * 1000)
}
