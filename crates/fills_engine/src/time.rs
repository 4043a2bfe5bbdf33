use chrono::{DateTime, Utc};

/// Render an epoch timestamp as `YYYY-MM-DD HH:MM:SS UTC`.
///
/// Out-of-range values fall back to the raw number.
pub fn format_utc(timestamp: i64) -> String {
    match DateTime::<Utc>::from_timestamp(timestamp, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("{timestamp} (out of range)"),
    }
}
