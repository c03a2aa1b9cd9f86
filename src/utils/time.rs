//! Time and timestamp utilities

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;

/// Current Unix time as float seconds
pub fn now_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Current UTC time as an RFC 3339 string
pub fn iso_now() -> String {
    Utc::now().to_rfc3339()
}

/// Compact UTC stamp with millisecond resolution, safe for filenames
///
/// Sorts lexicographically in chronological order.
pub fn utc_compact() -> String {
    Utc::now().format("%Y%m%d-%H%M%S%3f").to_string()
}
