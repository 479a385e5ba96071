//! Storage-only data models.
//!
//! Subscription and rule records live in `sieve_core::models`; this module
//! only holds what the core never sees.

use serde::{Deserialize, Serialize};

/// Application configuration stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configuration key.
    pub key: String,
    /// Configuration value (JSON).
    pub value: serde_json::Value,
}

/// Row counts across the subscription tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub subscriptions: i64,
    pub rules: i64,
    pub cross_refs: i64,
}
