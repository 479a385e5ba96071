//! Persistence boundary used by the sync and filter engines.

use crate::error::Result;
use crate::models::{Rule, RuleMode, RuleSubscription, RuleSubscriptionWithRules};

/// Storage for subscriptions, rules, and their cross-references.
///
/// Every write must be atomic: a failed or interrupted call leaves the store
/// exactly as it was. An implementation whose backing store cannot be reached
/// returns [`crate::SieveError::StoreUnavailable`] instead of an empty result.
pub trait SubscriptionStore: Send + Sync {
    /// All subscriptions, ordered by priority.
    fn get_all(&self) -> Result<Vec<RuleSubscriptionWithRules>>;

    /// Every subscription of `mode`, enabled or not, ordered by priority.
    fn get_all_with_rule_by_mode(&self, mode: RuleMode) -> Result<Vec<RuleSubscriptionWithRules>>;

    /// Enabled subscriptions of `mode`, ordered by priority.
    fn get_all_active_with_rule(&self, mode: RuleMode) -> Result<Vec<RuleSubscriptionWithRules>>;

    /// Looks up one subscription with its rules.
    fn find_by_id(&self, subscription_id: i64) -> Result<Option<RuleSubscriptionWithRules>>;

    /// Number of stored subscriptions.
    fn subscription_count(&self) -> Result<usize>;

    /// Ids of subscriptions whose downloaded config is `file_path`.
    fn subscriptions_using_file(&self, file_path: &str) -> Result<Vec<i64>>;

    /// Inserts (id 0) or reconciles (existing id) a subscription and its rules.
    ///
    /// Rules are reused by `(rule_type, rule_value)`; the subscription ends up
    /// referencing exactly `subscription.rules`. Reconciling an id that no
    /// longer exists is an error and writes nothing. Returns the subscription id.
    fn insert_all(&self, subscription: &RuleSubscriptionWithRules) -> Result<i64>;

    /// Updates the subscription row only.
    fn update(&self, subscription: &RuleSubscription) -> Result<()>;

    /// Deletes a subscription, its cross-references, and rules nobody else uses.
    fn delete(&self, subscription: &RuleSubscriptionWithRules) -> Result<()>;

    /// Looks up a rule by identity.
    fn find_rule_by_type_and_value(&self, rule_type: &str, rule_value: &str) -> Result<Option<Rule>>;
}
