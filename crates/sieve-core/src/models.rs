//! Subscription and rule records.
//!
//! These are the persisted shapes shared between the engine and the store.
//! A [`Rule`] is identified by its `(rule_type, rule_value)` pair; the numeric
//! id is assigned by storage and may be shared by several subscriptions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which list a subscription feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleMode {
    /// Matched apps go through the proxy.
    Proxy,
    /// Matched apps bypass the proxy.
    #[default]
    ByPass,
}

impl RuleMode {
    /// All modes, in display order.
    pub const ALL: [RuleMode; 2] = [RuleMode::Proxy, RuleMode::ByPass];

    /// Returns the config/database spelling of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleMode::Proxy => "proxy",
            RuleMode::ByPass => "bypass",
        }
    }

    /// Parses the config/database spelling of a mode.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "proxy" => Some(RuleMode::Proxy),
            "bypass" => Some(RuleMode::ByPass),
            _ => None,
        }
    }

    /// Returns a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            RuleMode::Proxy => "Proxy",
            RuleMode::ByPass => "Bypass",
        }
    }
}

impl std::fmt::Display for RuleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the most recent sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Success,
    Failed,
}

impl SyncStatus {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
        }
    }

    /// Parse from database string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(SyncStatus::Success),
            "failed" => Some(SyncStatus::Failed),
            _ => None,
        }
    }
}

/// Identity of a rule, independent of its storage id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    pub rule_type: String,
    pub rule_value: String,
}

/// One atomic predicate as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Storage id, 0 until persisted.
    pub id: i64,
    /// Tag such as `EXTRA` or `REGEX`.
    pub rule_type: String,
    /// Package name or regex source.
    pub rule_value: String,
}

impl Rule {
    /// Creates an unsaved rule.
    pub fn new(rule_type: impl Into<String>, rule_value: impl Into<String>) -> Self {
        Self {
            id: 0,
            rule_type: rule_type.into(),
            rule_value: rule_value.into(),
        }
    }

    /// Returns the identity key of this rule.
    pub fn key(&self) -> RuleKey {
        RuleKey {
            rule_type: self.rule_type.clone(),
            rule_value: self.rule_value.clone(),
        }
    }
}

/// A named, versioned pointer to a remote rule config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSubscription {
    /// Storage id, 0 asks the store to allocate one.
    pub subscription_id: i64,
    pub name: String,
    pub url: String,
    pub mode: RuleMode,
    pub enable: bool,
    pub priority: i32,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub last_sync_time: DateTime<Utc>,
    pub last_sync_status: SyncStatus,
    pub version: i32,
    pub extra: String,
    /// Absolute path of the downloaded config on disk.
    pub file_path: String,
}

impl RuleSubscription {
    /// Folds a freshly parsed copy of this subscription into the stored one.
    ///
    /// Identity, enable flag, priority and creation time stay with `self`.
    pub fn merge_synced(&self, fresh: &RuleSubscription) -> RuleSubscription {
        RuleSubscription {
            name: fresh.name.clone(),
            url: fresh.url.clone(),
            mode: fresh.mode,
            update_time: fresh.update_time,
            last_sync_time: fresh.last_sync_time,
            last_sync_status: fresh.last_sync_status,
            version: fresh.version,
            extra: fresh.extra.clone(),
            file_path: fresh.file_path.clone(),
            ..self.clone()
        }
    }

    /// Returns a copy marked as failed at `at`.
    pub fn mark_failed(&self, at: DateTime<Utc>) -> RuleSubscription {
        RuleSubscription {
            last_sync_time: at,
            last_sync_status: SyncStatus::Failed,
            ..self.clone()
        }
    }
}

/// Join row between a subscription and one of its rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionRuleCrossRef {
    pub subscription_id: i64,
    pub rule_id: i64,
}

/// A subscription together with its resolved rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSubscriptionWithRules {
    pub subscription: RuleSubscription,
    pub rules: Vec<Rule>,
}

impl RuleSubscriptionWithRules {
    /// Returns the subscription id.
    pub fn id(&self) -> i64 {
        self.subscription.subscription_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription() -> RuleSubscription {
        let now = Utc::now();
        RuleSubscription {
            subscription_id: 7,
            name: "old.conf".to_string(),
            url: "https://example.com/old.conf".to_string(),
            mode: RuleMode::ByPass,
            enable: false,
            priority: 3,
            create_time: now,
            update_time: now,
            last_sync_time: now,
            last_sync_status: SyncStatus::Failed,
            version: 1,
            extra: String::new(),
            file_path: "/tmp/old.conf".to_string(),
        }
    }

    #[test]
    fn test_mode_round_trip() {
        for mode in RuleMode::ALL {
            assert_eq!(RuleMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(RuleMode::parse("direct"), None);
    }

    #[test]
    fn test_merge_synced_keeps_identity() {
        let stored = subscription();
        let mut fresh = subscription();
        fresh.subscription_id = 0;
        fresh.name = "new.conf".to_string();
        fresh.enable = true;
        fresh.priority = 0;
        fresh.last_sync_status = SyncStatus::Success;
        fresh.file_path = "/tmp/new.conf".to_string();

        let merged = stored.merge_synced(&fresh);
        assert_eq!(merged.subscription_id, 7);
        assert!(!merged.enable);
        assert_eq!(merged.priority, 3);
        assert_eq!(merged.name, "new.conf");
        assert_eq!(merged.file_path, "/tmp/new.conf");
        assert_eq!(merged.last_sync_status, SyncStatus::Success);
    }

    #[test]
    fn test_rule_key_ignores_id() {
        let mut a = Rule::new("EXTRA", "com.x");
        let b = Rule::new("EXTRA", "com.x");
        a.id = 42;
        assert_eq!(a.key(), b.key());
    }
}
