//! Sieve Storage - SQLite persistence layer.
//!
//! This crate stores rule subscriptions for the Sieve engine. It handles:
//!
//! - Subscriptions, rules, and the cross-references between them
//! - Transactional reconcile of a subscription's rule set
//! - Change notification for live subscription listings
//! - Settings key-value storage
//!
//! [`Database`] implements [`sieve_core::SubscriptionStore`], so it plugs
//! straight into the sync and filter engines.
//!
//! # Example
//!
//! ```no_run
//! use sieve_storage::Database;
//! use sieve_core::RuleMode;
//!
//! let db = Database::in_memory().unwrap();
//! let bypass = db.subscriptions_by_mode(RuleMode::ByPass, true).unwrap();
//! assert!(bypass.is_empty());
//! ```

mod database;
pub mod error;
mod feed;
pub mod models;
mod pool;
pub mod repository;
mod schema;

pub use database::Database;
pub use error::{Result, StorageError};
pub use feed::SubscriptionFeed;
pub use models::{Config, StoreStats};
pub use pool::ConnectionPool;
pub use repository::{ConfigRepo, RulesRepo, SubscriptionsRepo};
