//! Wiring of the database, engines, and download directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sieve_core::{
    relative_time, AppInfo, ConfFetcher, ExportFormat, FilterEngine, RuleMatchCache, RuleMode,
    RuleSubscriptionWithRules, SieveError, SubscriptionSyncEngine, SyncReport,
};
use sieve_storage::{Database, StorageError};
use thiserror::Error;
use tracing::info;

/// Errors surfaced by [`SieveApp`].
#[derive(Debug, Error)]
pub enum AppError {
    /// Engine error (network, parse, store).
    #[error(transparent)]
    Core(#[from] SieveError),

    /// Direct storage access failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// No subscription with this id.
    #[error("no subscription with id {0}")]
    NotFound(i64),
}

/// Result type for app operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Everything a command needs.
pub struct SieveApp {
    db: Database,
    sync: SubscriptionSyncEngine,
    filter: FilterEngine,
    conf_dir: PathBuf,
}

impl SieveApp {
    /// Creates the app over an open database.
    pub fn new(db: Database, fetcher: Arc<dyn ConfFetcher>, conf_dir: impl Into<PathBuf>) -> Self {
        let store = Arc::new(db.clone());
        let cache = Arc::new(RuleMatchCache::default());

        Self {
            sync: SubscriptionSyncEngine::new(store.clone(), fetcher),
            filter: FilterEngine::new(store, cache),
            db,
            conf_dir: conf_dir.into(),
        }
    }

    /// The underlying database.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Directory new subscription configs are downloaded into.
    pub fn conf_dir(&self) -> &Path {
        &self.conf_dir
    }

    /// Subscriptions for display: every one of `mode`, or all of them.
    pub fn subscriptions(&self, mode: Option<RuleMode>) -> Result<Vec<RuleSubscriptionWithRules>> {
        let subscriptions = match mode {
            Some(mode) => self.db.subscriptions_by_mode(mode, false)?,
            None => self.db.subscriptions_with_rules()?,
        };
        Ok(subscriptions)
    }

    /// Looks up one subscription.
    pub fn subscription(&self, id: i64) -> Result<RuleSubscriptionWithRules> {
        self.db.get_subscription(id)?.ok_or(AppError::NotFound(id))
    }

    /// Downloads and stores a new subscription.
    pub async fn add(&self, name: Option<&str>, url: &str) -> Result<RuleSubscriptionWithRules> {
        let id = self.sync.add_subscription(name, url, &self.conf_dir).await?;
        self.subscription(id)
    }

    /// Re-syncs one subscription by id.
    pub async fn sync_one(&self, id: i64) -> Result<RuleSubscriptionWithRules> {
        let subscription = self.subscription(id)?;
        match self.sync.sync_one(&subscription, &self.conf_dir).await {
            Ok(synced) => Ok(synced),
            Err(e) => {
                self.db
                    .update_subscription(&subscription.subscription.mark_failed(Utc::now()))?;
                Err(e.into())
            }
        }
    }

    /// Syncs every enabled subscription of `mode`.
    pub async fn sync_mode(&self, mode: RuleMode) -> Result<SyncReport> {
        Ok(self.sync.sync_all(mode, &self.conf_dir).await?)
    }

    /// Enables or disables a subscription.
    pub fn set_enabled(&self, id: i64, enabled: bool) -> Result<()> {
        let subscription = self.subscription(id)?;
        self.sync.set_enabled(&subscription.subscription, enabled)?;
        info!(subscription_id = id, enabled, "Changed subscription state");
        Ok(())
    }

    /// Deletes a subscription and its downloaded config file.
    ///
    /// The file stays on disk while another subscription still points at it.
    pub fn delete(&self, id: i64) -> Result<()> {
        let subscription = self.subscription(id)?;
        self.sync.delete_subscription(&subscription)?;

        let stored_path = &subscription.subscription.file_path;
        if stored_path.is_empty() {
            return Ok(());
        }
        let others = self.db.subscriptions_using_file(stored_path)?;
        if !others.is_empty() {
            info!(
                subscription_id = id,
                path = %stored_path,
                "Config file still used by another subscription"
            );
            return Ok(());
        }

        let file_path = Path::new(stored_path);
        if file_path.exists() {
            if let Err(e) = std::fs::remove_file(file_path) {
                tracing::warn!(path = %file_path.display(), error = %e, "Could not remove config file");
            }
        }
        Ok(())
    }

    /// Keeps the packages matched by `mode`'s active rule set.
    pub fn filter(&self, packages: &[AppInfo], mode: RuleMode) -> Result<Vec<AppInfo>> {
        Ok(self.filter.filter(packages, mode)?)
    }

    /// Filters and renders `packages` for a client.
    pub fn export(&self, packages: &[AppInfo], mode: RuleMode, format: ExportFormat) -> Result<String> {
        Ok(self.filter.export(packages, mode, format)?)
    }
}

/// One line of `sieve list` output.
pub fn format_subscription_row(subscription: &RuleSubscriptionWithRules, now: DateTime<Utc>) -> String {
    let s = &subscription.subscription;
    format!(
        "{:>4}  {:<24}  {:<6}  {:<8}  {:>5} rules  {} ({})",
        s.subscription_id,
        s.name,
        s.mode.as_str(),
        if s.enable { "enabled" } else { "disabled" },
        subscription.rules.len(),
        s.last_sync_status.as_str(),
        relative_time(s.last_sync_time, now),
    )
}

/// Human summary of a batch sync.
pub fn format_sync_report(mode: RuleMode, report: &SyncReport) -> String {
    let mut out = format!(
        "{}: {} synced, {} failed",
        mode.label(),
        report.synced.len(),
        report.failed.len()
    );
    for failure in &report.failed {
        out.push_str(&format!(
            "\n  #{} {}: {}",
            failure.subscription_id, failure.name, failure.error
        ));
    }
    out
}
