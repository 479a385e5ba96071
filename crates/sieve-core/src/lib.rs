//! Sieve Core - rule subscriptions and package filtering.
//!
//! This crate holds everything that is not persistence or UI:
//!
//! - The rule line format and its match predicates ([`RulePattern`])
//! - Streaming subscription config parsing ([`ConfParser`])
//! - A bounded cache of compiled predicates ([`RuleMatchCache`])
//! - Download, parse and reconcile of subscriptions ([`SubscriptionSyncEngine`])
//! - Filtering package lists and rendering client exports ([`FilterEngine`])
//!
//! Storage is reached through the [`SubscriptionStore`] trait and downloads
//! through [`ConfFetcher`], so both engines can run against in-memory fakes.
//!
//! # Example
//!
//! ```
//! use sieve_core::{ConfParser, RuleMode};
//!
//! let mut parser = ConfParser::new("cn.conf", "https://example.com/cn.conf", "/tmp/cn.conf", 0);
//! parser.parse_text("mode=bypass\nEXTRA,com.tencent.mm\n").unwrap();
//!
//! let parsed = parser.get().unwrap();
//! assert_eq!(parsed.subscription.mode, RuleMode::ByPass);
//! assert_eq!(parsed.rules.len(), 1);
//! ```

pub mod app_info;
pub mod conf_parser;
pub mod error;
pub mod export;
pub mod fetch;
pub mod filter;
pub mod match_cache;
pub mod models;
pub mod relative_time;
pub mod rule_pattern;
pub mod store;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use app_info::{parse_package_list, AppInfo};
pub use conf_parser::ConfParser;
pub use error::{Result, SieveError};
pub use export::ExportFormat;
pub use fetch::{ConfFetcher, ConfResponse, HttpConfFetcher};
pub use filter::{filter_packages, FilterEngine};
pub use match_cache::{RuleMatchCache, DEFAULT_CACHE_CAPACITY};
pub use models::{
    Rule, RuleKey, RuleMode, RuleSubscription, RuleSubscriptionWithRules,
    SubscriptionRuleCrossRef, SyncStatus,
};
pub use relative_time::relative_time;
pub use rule_pattern::{RegexRule, RulePattern};
pub use store::SubscriptionStore;
pub use sync::{
    resolve_file_name, validate_subscription_url, SubscriptionSyncEngine, SyncFailure, SyncReport,
};
