//! Database repositories for each table.

pub mod config;
pub mod rules;
pub mod subscriptions;

pub use config::ConfigRepo;
pub use rules::RulesRepo;
pub use subscriptions::SubscriptionsRepo;

use chrono::{DateTime, Utc};

/// Parse a datetime from SQLite format.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}
