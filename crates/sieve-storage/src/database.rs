//! High-level database interface.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use directories::ProjectDirs;
use sieve_core::{
    Rule, RuleMode, RuleSubscription, RuleSubscriptionWithRules, SieveError, SubscriptionStore,
};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::feed::SubscriptionFeed;
use crate::models::{Config, StoreStats};
use crate::pool::ConnectionPool;
use crate::repository::{ConfigRepo, RulesRepo, SubscriptionsRepo};

/// High-level database interface for Sieve.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
    revision: Arc<watch::Sender<u64>>,
}

impl Database {
    /// Create a new database in the default app data directory.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_db_path()?)
    }

    /// Create a new database at a specific path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self::from_pool(pool))
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::in_memory()?;
        Ok(Self::from_pool(pool))
    }

    fn from_pool(pool: ConnectionPool) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            pool,
            revision: Arc::new(revision),
        }
    }

    /// Get the app data directory.
    pub fn data_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("me", "rosuh", "sieve")
            .ok_or_else(|| StorageError::Config("Could not determine app data directory".into()))?;

        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Get the default database path.
    pub fn default_db_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("sieve.db"))
    }

    /// Get the default directory for downloaded subscription configs.
    pub fn default_conf_dir() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("subscriptions"))
    }

    fn notify(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    /// Current write revision. Bumped after every committed write.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Subscribe to subscription changes.
    ///
    /// `None` follows every enabled subscription; `Some(mode)` follows every
    /// subscription of that mode, enabled or not.
    pub fn watch_subscriptions(&self, mode: Option<RuleMode>) -> SubscriptionFeed {
        SubscriptionFeed::new(self.clone(), mode, self.revision.subscribe())
    }

    // === Subscriptions ===

    /// Attach rules to each subscription row.
    fn with_rules(
        conn: &rusqlite::Connection,
        subscriptions: Vec<RuleSubscription>,
    ) -> Result<Vec<RuleSubscriptionWithRules>> {
        subscriptions
            .into_iter()
            .map(|subscription| -> Result<RuleSubscriptionWithRules> {
                let rules = RulesRepo::get_for_subscription(conn, subscription.subscription_id)?;
                Ok(RuleSubscriptionWithRules {
                    subscription,
                    rules,
                })
            })
            .collect()
    }

    /// Get every subscription with its rules, ordered by priority.
    pub fn subscriptions_with_rules(&self) -> Result<Vec<RuleSubscriptionWithRules>> {
        let conn = self.pool.get()?;
        let subscriptions = SubscriptionsRepo::get_all(&conn)?;
        Self::with_rules(&conn, subscriptions)
    }

    /// Get the subscriptions of a mode with their rules.
    pub fn subscriptions_by_mode(
        &self,
        mode: RuleMode,
        active_only: bool,
    ) -> Result<Vec<RuleSubscriptionWithRules>> {
        let conn = self.pool.get()?;
        let subscriptions = SubscriptionsRepo::get_by_mode(&conn, mode, active_only)?;
        Self::with_rules(&conn, subscriptions)
    }

    /// Get every enabled subscription with its rules, any mode.
    pub fn active_subscriptions(&self) -> Result<Vec<RuleSubscriptionWithRules>> {
        let conn = self.pool.get()?;
        let subscriptions = SubscriptionsRepo::get_active(&conn)?;
        Self::with_rules(&conn, subscriptions)
    }

    /// Get one subscription with its rules.
    pub fn get_subscription(&self, id: i64) -> Result<Option<RuleSubscriptionWithRules>> {
        let conn = self.pool.get()?;
        match SubscriptionsRepo::get_by_id(&conn, id)? {
            Some(subscription) => {
                let rules = RulesRepo::get_for_subscription(&conn, id)?;
                Ok(Some(RuleSubscriptionWithRules {
                    subscription,
                    rules,
                }))
            }
            None => Ok(None),
        }
    }

    /// Insert or reconcile a subscription and its rules in one transaction.
    ///
    /// Id 0 inserts a new row; any other id updates that row in place and
    /// fails with [`StorageError::NotFound`] if it has been deleted meanwhile.
    /// Rules are reused by identity, references not in `subscription.rules`
    /// are removed, and rules nobody references afterwards are deleted.
    pub fn insert_subscription_with_rules(
        &self,
        subscription: &RuleSubscriptionWithRules,
    ) -> Result<i64> {
        let conn = self.pool.get()?;
        let tx = conn.unchecked_transaction()?;

        let id = if subscription.id() == 0 {
            SubscriptionsRepo::insert(&tx, &subscription.subscription)?
        } else {
            SubscriptionsRepo::update(&tx, &subscription.subscription)?;
            subscription.id()
        };

        let mut keep = HashSet::with_capacity(subscription.rules.len());
        for (position, rule) in subscription.rules.iter().enumerate() {
            let rule_id = RulesRepo::find_or_insert(&tx, &rule.rule_type, &rule.rule_value)?;
            if keep.insert(rule_id) {
                RulesRepo::link(&tx, id, rule_id, position as i64)?;
            }
        }

        let mut unlinked = 0;
        for cross_ref in RulesRepo::cross_refs_for_subscription(&tx, id)? {
            if !keep.contains(&cross_ref.rule_id) {
                RulesRepo::unlink(&tx, id, cross_ref.rule_id)?;
                unlinked += 1;
            }
        }
        let orphans = RulesRepo::delete_orphans(&tx)?;

        tx.commit()?;
        drop(conn);
        self.notify();

        debug!(
            subscription_id = id,
            rules = keep.len(),
            unlinked,
            orphans,
            "Stored subscription"
        );
        Ok(id)
    }

    /// Update the subscription row only.
    pub fn update_subscription(&self, subscription: &RuleSubscription) -> Result<()> {
        {
            let conn = self.pool.get()?;
            SubscriptionsRepo::update(&conn, subscription)?;
        }
        self.notify();
        Ok(())
    }

    /// Delete a subscription, its references, and rules only it used.
    pub fn delete_subscription(&self, id: i64) -> Result<()> {
        {
            let conn = self.pool.get()?;
            let tx = conn.unchecked_transaction()?;

            RulesRepo::unlink_all(&tx, id)?;
            RulesRepo::delete_orphans(&tx)?;
            SubscriptionsRepo::delete(&tx, id)?;

            tx.commit()?;
        }
        self.notify();
        Ok(())
    }

    /// Look up a rule by identity.
    pub fn find_rule(&self, rule_type: &str, rule_value: &str) -> Result<Option<Rule>> {
        let conn = self.pool.get()?;
        RulesRepo::find_by_type_and_value(&conn, rule_type, rule_value)
    }

    /// Number of stored subscriptions.
    pub fn subscription_count(&self) -> Result<usize> {
        let conn = self.pool.get()?;
        Ok(SubscriptionsRepo::count(&conn)? as usize)
    }

    /// Ids of subscriptions whose config file is `file_path`.
    pub fn subscriptions_using_file(&self, file_path: &str) -> Result<Vec<i64>> {
        let conn = self.pool.get()?;
        SubscriptionsRepo::ids_by_file_path(&conn, file_path)
    }

    /// Row counts across the subscription tables.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.pool.get()?;
        Ok(StoreStats {
            subscriptions: SubscriptionsRepo::count(&conn)?,
            rules: RulesRepo::count(&conn)?,
            cross_refs: RulesRepo::count_cross_refs(&conn)?,
        })
    }

    // === Config ===

    /// Get a configuration value.
    pub fn get_config(&self, key: &str) -> Result<Option<Config>> {
        let conn = self.pool.get()?;
        ConfigRepo::get(&conn, key)
    }

    /// Set a configuration value.
    pub fn set_config(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.pool.get()?;
        ConfigRepo::set(&conn, key, value)
    }

    /// Get a typed configuration value with default.
    pub fn get_config_or_default<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T> {
        let conn = self.pool.get()?;
        ConfigRepo::get_or_default(&conn, key, default)
    }
}

impl SubscriptionStore for Database {
    fn get_all(&self) -> sieve_core::Result<Vec<RuleSubscriptionWithRules>> {
        Ok(self.subscriptions_with_rules()?)
    }

    fn get_all_with_rule_by_mode(
        &self,
        mode: RuleMode,
    ) -> sieve_core::Result<Vec<RuleSubscriptionWithRules>> {
        Ok(self.subscriptions_by_mode(mode, false)?)
    }

    fn get_all_active_with_rule(
        &self,
        mode: RuleMode,
    ) -> sieve_core::Result<Vec<RuleSubscriptionWithRules>> {
        Ok(self.subscriptions_by_mode(mode, true)?)
    }

    fn find_by_id(&self, subscription_id: i64) -> sieve_core::Result<Option<RuleSubscriptionWithRules>> {
        Ok(self.get_subscription(subscription_id)?)
    }

    fn subscription_count(&self) -> sieve_core::Result<usize> {
        Ok(Database::subscription_count(self)?)
    }

    fn subscriptions_using_file(&self, file_path: &str) -> sieve_core::Result<Vec<i64>> {
        Ok(Database::subscriptions_using_file(self, file_path)?)
    }

    fn insert_all(&self, subscription: &RuleSubscriptionWithRules) -> sieve_core::Result<i64> {
        Ok(self.insert_subscription_with_rules(subscription)?)
    }

    fn update(&self, subscription: &RuleSubscription) -> sieve_core::Result<()> {
        Ok(self.update_subscription(subscription)?)
    }

    fn delete(&self, subscription: &RuleSubscriptionWithRules) -> sieve_core::Result<()> {
        self.delete_subscription(subscription.id())
            .map_err(SieveError::from)
    }

    fn find_rule_by_type_and_value(
        &self,
        rule_type: &str,
        rule_value: &str,
    ) -> sieve_core::Result<Option<Rule>> {
        Ok(self.find_rule(rule_type, rule_value)?)
    }
}
