//! Human-readable relative durations for sync timestamps.

use chrono::{DateTime, Utc};

/// Formats `then` relative to `now`, e.g. `3m ago` or `in 2h`.
///
/// Uses the largest whole unit out of days, hours and minutes. Seconds are
/// only shown from 30 upward; anything closer is `just now`.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let past = delta.num_milliseconds() >= 0;
    let delta = delta.abs();

    let amount = if delta.num_days() > 0 {
        format!("{}d", delta.num_days())
    } else if delta.num_hours() > 0 {
        format!("{}h", delta.num_hours())
    } else if delta.num_minutes() > 0 {
        format!("{}m", delta.num_minutes())
    } else if delta.num_seconds() >= 30 {
        format!("{}s", delta.num_seconds())
    } else {
        return "just now".to_string();
    };

    if past {
        format!("{amount} ago")
    } else {
        format!("in {amount}")
    }
}
