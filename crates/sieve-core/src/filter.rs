//! Package filtering and export.

use std::sync::Arc;

use tracing::debug;

use crate::app_info::AppInfo;
use crate::error::Result;
use crate::export::{self, ExportFormat};
use crate::match_cache::RuleMatchCache;
use crate::models::{RuleMode, RuleSubscriptionWithRules};
use crate::store::SubscriptionStore;

/// Returns the packages matched by any rule of any subscription, in input order.
///
/// Matching short-circuits on the first hit. An empty subscription list or
/// an empty rule set matches nothing.
pub fn filter_packages(
    subscriptions: &[RuleSubscriptionWithRules],
    packages: &[AppInfo],
    cache: &RuleMatchCache,
) -> Vec<AppInfo> {
    packages
        .iter()
        .filter(|app| {
            subscriptions.iter().any(|subscription| {
                subscription
                    .rules
                    .iter()
                    .any(|rule| cache.get_or_compile(rule).matches(&app.package_name))
            })
        })
        .cloned()
        .collect()
}

/// Applies the active rule set of a mode to package lists.
#[derive(Clone)]
pub struct FilterEngine {
    store: Arc<dyn SubscriptionStore>,
    cache: Arc<RuleMatchCache>,
}

impl FilterEngine {
    /// Creates an engine reading rules from `store` and compiling them through `cache`.
    pub fn new(store: Arc<dyn SubscriptionStore>, cache: Arc<RuleMatchCache>) -> Self {
        Self { store, cache }
    }

    /// Keeps the packages matched by the enabled subscriptions of `mode`.
    ///
    /// Fails only when the rule set cannot be loaded from the store.
    pub fn filter(&self, packages: &[AppInfo], mode: RuleMode) -> Result<Vec<AppInfo>> {
        let subscriptions = self.store.get_all_active_with_rule(mode)?;
        let matched = filter_packages(&subscriptions, packages, &self.cache);

        debug!(
            mode = %mode,
            subscriptions = subscriptions.len(),
            candidates = packages.len(),
            matched = matched.len(),
            "Filtered packages"
        );
        Ok(matched)
    }

    /// Filters `packages` and renders the matched names in `format`.
    pub fn export(&self, packages: &[AppInfo], mode: RuleMode, format: ExportFormat) -> Result<String> {
        let matched = self.filter(packages, mode)?;
        let names: Vec<&str> = matched.iter().map(|app| app.package_name.as_str()).collect();
        export::render(&names, mode, format)
    }
}
