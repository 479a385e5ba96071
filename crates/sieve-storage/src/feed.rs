//! Push-style subscription listings.

use sieve_core::{RuleMode, RuleSubscriptionWithRules};
use tokio::sync::watch;

use crate::database::Database;
use crate::error::{Result, StorageError};

/// A live view of the subscription list.
///
/// Created by [`Database::watch_subscriptions`]. Each committed write wakes
/// [`SubscriptionFeed::changed`], which then re-reads the list.
pub struct SubscriptionFeed {
    db: Database,
    mode: Option<RuleMode>,
    revision: watch::Receiver<u64>,
}

impl SubscriptionFeed {
    pub(crate) fn new(db: Database, mode: Option<RuleMode>, revision: watch::Receiver<u64>) -> Self {
        Self { db, mode, revision }
    }

    /// The mode this feed follows, `None` for every enabled subscription.
    pub fn mode(&self) -> Option<RuleMode> {
        self.mode
    }

    /// Reads the list as it is now.
    pub fn current(&self) -> Result<Vec<RuleSubscriptionWithRules>> {
        match self.mode {
            Some(mode) => self.db.subscriptions_by_mode(mode, false),
            None => self.db.active_subscriptions(),
        }
    }

    /// Returns true if a write landed since the last [`changed`](Self::changed).
    pub fn has_changed(&self) -> bool {
        self.revision.has_changed().unwrap_or(false)
    }

    /// Waits for the next committed write and returns the refreshed list.
    pub async fn changed(&mut self) -> Result<Vec<RuleSubscriptionWithRules>> {
        self.revision
            .changed()
            .await
            .map_err(|_| StorageError::Unavailable("Database closed".to_string()))?;
        self.current()
    }
}
