//! Streaming parser for subscription configs.
//!
//! Lines are fed one at a time with [`ConfParser::parse`], typically straight
//! from a download stream, and the result is materialized with
//! [`ConfParser::get`].

use std::collections::HashSet;

use chrono::Utc;

use crate::error::{Result, SieveError};
use crate::models::{Rule, RuleKey, RuleMode, RuleSubscription, RuleSubscriptionWithRules, SyncStatus};
use crate::rule_pattern::RulePattern;

/// Accumulates rules and the mode directive of one subscription config.
#[derive(Debug, Clone)]
pub struct ConfParser {
    name: String,
    url: String,
    file_path: String,
    priority: i32,
    rules: Vec<Rule>,
    seen: HashSet<RuleKey>,
    mode: Option<RuleMode>,
}

impl ConfParser {
    /// Creates a parser for a subscription with the given identity fields.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        file_path: impl Into<String>,
        priority: i32,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            file_path: file_path.into(),
            priority,
            rules: Vec::new(),
            seen: HashSet::new(),
            mode: None,
        }
    }

    /// Consumes one line.
    ///
    /// Only `EXTRA`/`REGEX` lines become rules; markers and unknown lines are
    /// recognized and dropped. Repeated rules are kept once. The single error
    /// is a `mode=` line whose value is neither `proxy` nor `bypass`.
    pub fn parse(&mut self, line: &str) -> Result<()> {
        match RulePattern::from_line(line) {
            pattern @ (RulePattern::Extra(_) | RulePattern::Regex(_)) => {
                let rule = pattern.to_rule();
                if self.seen.insert(rule.key()) {
                    self.rules.push(rule);
                }
            }
            RulePattern::Mode(value) => {
                let mode = RuleMode::parse(&value).ok_or(SieveError::InvalidMode(value))?;
                self.mode = Some(mode);
            }
            RulePattern::Config(_) | RulePattern::Rule(_) | RulePattern::Unknown(_) => {}
        }
        Ok(())
    }

    /// Feeds every line of `text`.
    pub fn parse_text(&mut self, text: &str) -> Result<()> {
        for line in text.lines() {
            self.parse(line)?;
        }
        Ok(())
    }

    /// Returns the mode declared so far, if any.
    pub fn mode(&self) -> Option<RuleMode> {
        self.mode
    }

    /// Returns the rules collected so far.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Returns the subscription name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the path the config is written to.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Builds a fresh, unsaved subscription from everything parsed so far.
    ///
    /// Fails with [`SieveError::MissingMode`] if no `mode=` line was seen.
    pub fn get(&self) -> Result<RuleSubscriptionWithRules> {
        let mode = self.mode.ok_or(SieveError::MissingMode)?;
        let now = Utc::now();

        let subscription = RuleSubscription {
            subscription_id: 0,
            name: self.name.clone(),
            url: self.url.clone(),
            mode,
            enable: true,
            priority: self.priority,
            create_time: now,
            update_time: now,
            last_sync_time: now,
            last_sync_status: SyncStatus::Success,
            version: 0,
            extra: String::new(),
            file_path: self.file_path.clone(),
        };

        Ok(RuleSubscriptionWithRules {
            subscription,
            rules: self.rules.clone(),
        })
    }
}
